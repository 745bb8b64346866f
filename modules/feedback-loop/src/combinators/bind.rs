//! Scoped resource binding.
//!
//! A bound source acquires its resources when the loop subscribes to it and
//! releases every one of them exactly once when its participation ends:
//! its event streams finish, the loop fails, or the loop is disposed.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, SelectAll, Stream, StreamExt};
use tracing::warn;

use crate::resource::{Resource, ResourceSet};
use crate::source::{EventStream, FeedbackContext, FeedbackSource};

/// Resources acquired by a bound source plus the event streams they feed.
pub struct Bindings<E> {
    resources: ResourceSet,
    events: Vec<EventStream<E>>,
}

impl<E> Default for Bindings<E> {
    fn default() -> Self {
        Self {
            resources: ResourceSet::new(),
            events: Vec::new(),
        }
    }
}

impl<E> Bindings<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource<R: Resource>(mut self, resource: R) -> Self {
        self.resources.push(Box::new(resource));
        self
    }

    pub fn with_events(mut self, events: EventStream<E>) -> Self {
        self.events.push(events);
        self
    }
}

/// Feedback source built by [`bind`].
pub struct Bind<F> {
    setup: Arc<F>,
}

/// Build a feedback source from `setup`, called once per running loop.
///
/// A setup error surfaces as a feedback failure. With no event streams the
/// bound source is a pure observer and stays subscribed until teardown.
pub fn bind<S, E, F>(setup: F) -> Bind<F>
where
    F: Fn(&FeedbackContext<S>) -> anyhow::Result<Bindings<E>> + Send + Sync + 'static,
{
    Bind {
        setup: Arc::new(setup),
    }
}

impl<S, E, F> FeedbackSource<S, E> for Bind<F>
where
    S: Clone + Send + 'static,
    E: Send + 'static,
    F: Fn(&FeedbackContext<S>) -> anyhow::Result<Bindings<E>> + Send + Sync + 'static,
{
    fn observe(&self, ctx: FeedbackContext<S>) -> EventStream<E> {
        let bindings = match (self.setup)(&ctx) {
            Ok(bindings) => bindings,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let Bindings { resources, events } = bindings;
        BoundStream {
            observer_only: events.is_empty(),
            events: events.into_iter().collect(),
            resources,
        }
        .boxed()
    }
}

struct BoundStream<E> {
    events: SelectAll<EventStream<E>>,
    observer_only: bool,
    resources: ResourceSet,
}

impl<E> Stream for BoundStream<E> {
    type Item = anyhow::Result<E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.observer_only {
            return Poll::Pending;
        }

        match this.events.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                for e in this.resources.release_all() {
                    warn!(error = %e, "Resource teardown failed");
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::StateChannel;
    use crate::resource::on_release;
    use crate::scheduler::Scheduler;
    use crate::source::events;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> FeedbackContext<u32> {
        let channel = StateChannel::new();
        channel.publish(0);
        FeedbackContext::new(channel, Scheduler::current().unwrap(), 0)
    }

    fn counted(counter: &Arc<AtomicUsize>) -> impl Resource {
        let counter = Arc::clone(counter);
        on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn completion_releases_resources_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let setups = Arc::new(AtomicUsize::new(0));

        let source = {
            let released = Arc::clone(&released);
            let setups = Arc::clone(&setups);
            bind(move |_ctx: &FeedbackContext<u32>| {
                setups.fetch_add(1, Ordering::SeqCst);
                Ok(Bindings::new()
                    .with_resource(counted(&released))
                    .with_resource(counted(&released))
                    .with_events(events(stream::iter(vec!['a', 'b']))))
            })
        };

        let collected: Vec<char> = source
            .observe(context())
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(collected, vec!['a', 'b']);
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn observer_only_binding_stays_live_until_dropped() {
        let released = Arc::new(AtomicUsize::new(0));
        let source = {
            let released = Arc::clone(&released);
            bind(move |_ctx: &FeedbackContext<u32>| {
                Ok(Bindings::<()>::new().with_resource(counted(&released)))
            })
        };

        let mut stream = source.observe(context());
        assert!(stream.next().now_or_never().is_none());
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(stream);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_setup_is_a_feedback_error() {
        let source = bind(|_ctx: &FeedbackContext<u32>| -> anyhow::Result<Bindings<()>> {
            Err(anyhow::anyhow!("widget missing"))
        });

        let mut stream = source.observe(context());
        let item = stream.next().await.unwrap();
        assert_eq!(item.unwrap_err().to_string(), "widget missing");
        assert!(stream.next().await.is_none());
    }
}
