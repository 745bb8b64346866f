//! React on a derived, de-duplicated control value.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{SelectAll, Stream, StreamExt};

use crate::channel::Values;
use crate::source::{EventStream, FeedbackContext, FeedbackSource};

/// What happens to effects still running when the control value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactPolicy {
    /// Keep earlier effects running; all of them contribute events.
    #[default]
    Overlap,
    /// Drop the running effect's stream whenever the control value changes,
    /// then start the new one (if the new value is not `None`).
    Restart,
}

/// Feedback source built by [`react`].
pub struct React<Q, F> {
    query: Arc<Q>,
    effect: Arc<F>,
    policy: ReactPolicy,
}

/// Run `effect` every time `query(state)` yields a new control value.
///
/// Consecutive equal values are ignored, and `None` means "no effect this
/// tick". Effect streams are polled on the loop's designated context, so
/// their events re-enter the loop there.
pub fn react<S, C, E, Q, F>(query: Q, effect: F) -> React<Q, F>
where
    Q: Fn(&S) -> Option<C> + Send + Sync + 'static,
    F: Fn(C) -> EventStream<E> + Send + Sync + 'static,
    C: Clone + PartialEq + Send + 'static,
{
    React {
        query: Arc::new(query),
        effect: Arc::new(effect),
        policy: ReactPolicy::default(),
    }
}

impl<Q, F> React<Q, F> {
    pub fn with_policy(mut self, policy: ReactPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ReactPolicy {
        self.policy
    }
}

impl<S, C, E, Q, F> FeedbackSource<S, E> for React<Q, F>
where
    S: Clone + Send + 'static,
    C: Clone + PartialEq + Send + 'static,
    E: Send + 'static,
    Q: Fn(&S) -> Option<C> + Send + Sync + 'static,
    F: Fn(C) -> EventStream<E> + Send + Sync + 'static,
{
    fn observe(&self, ctx: FeedbackContext<S>) -> EventStream<E> {
        ReactStream {
            states: Some(ctx.states()),
            query: Arc::clone(&self.query),
            effect: Arc::clone(&self.effect),
            policy: self.policy,
            last: None,
            running: SelectAll::new(),
        }
        .boxed()
    }
}

struct ReactStream<S, C, E, Q, F> {
    /// `None` once the loop stopped publishing.
    states: Option<Values<S>>,
    query: Arc<Q>,
    effect: Arc<F>,
    policy: ReactPolicy,
    /// Last projected value; outer `None` until the first state arrives.
    last: Option<Option<C>>,
    running: SelectAll<EventStream<E>>,
}

impl<S, C, E, Q, F> ReactStream<S, C, E, Q, F>
where
    C: Clone + PartialEq,
    Q: Fn(&S) -> Option<C>,
    F: Fn(C) -> EventStream<E>,
{
    fn on_state(&mut self, state: &S) {
        let control = (self.query)(state);
        if self.last.as_ref() == Some(&control) {
            return;
        }
        self.last = Some(control.clone());

        if self.policy == ReactPolicy::Restart {
            self.running = SelectAll::new();
        }
        if let Some(value) = control {
            self.running.push((self.effect)(value));
        }
    }
}

impl<S, C, E, Q, F> Unpin for ReactStream<S, C, E, Q, F> {}

impl<S, C, E, Q, F> Stream for ReactStream<S, C, E, Q, F>
where
    C: Clone + PartialEq,
    Q: Fn(&S) -> Option<C>,
    F: Fn(C) -> EventStream<E>,
{
    type Item = anyhow::Result<E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        while let Some(states) = this.states.as_mut() {
            match states.poll_next_unpin(cx) {
                Poll::Ready(Some(state)) => this.on_state(&state),
                Poll::Ready(None) => this.states = None,
                Poll::Pending => break,
            }
        }

        match this.running.poll_next_unpin(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
            // Nothing running: finished only if no more states can arrive.
            Poll::Ready(None) if this.states.is_none() => Poll::Ready(None),
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }
}
