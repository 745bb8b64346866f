//! Feedback sources: the loop's only way to receive events.
//!
//! A source observes the state sequence through a [`FeedbackContext`] and
//! answers with an [`EventStream`]. Streams are polled on the loop's
//! designated context; events produced on other threads travel through an
//! [`event_channel`] hop first.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::channel::{StateChannel, StateSubscription, Values};
use crate::resource::Resource;
use crate::scheduler::Scheduler;

/// Events emitted by one feedback source. An `Err` item is a feedback
/// failure and terminates the whole loop.
pub type EventStream<E> = BoxStream<'static, anyhow::Result<E>>;

/// Turns the observed state sequence into events.
pub trait FeedbackSource<S, E>: Send + Sync + 'static {
    fn observe(&self, ctx: FeedbackContext<S>) -> EventStream<E>;
}

impl<S, E, F> FeedbackSource<S, E> for F
where
    F: Fn(FeedbackContext<S>) -> EventStream<E> + Send + Sync + 'static,
{
    fn observe(&self, ctx: FeedbackContext<S>) -> EventStream<E> {
        self(ctx)
    }
}

/// Lift an infallible stream of events into an [`EventStream`].
pub fn events<E, St>(stream: St) -> EventStream<E>
where
    St: Stream<Item = E> + Send + 'static,
    E: 'static,
{
    stream.map(Ok).boxed()
}

// ---------------------------------------------------------------------------
// FeedbackContext
// ---------------------------------------------------------------------------

/// Read-only view of a running loop handed to each feedback source.
pub struct FeedbackContext<S> {
    channel: StateChannel<S>,
    scheduler: Scheduler,
    source_index: usize,
}

impl<S> Clone for FeedbackContext<S> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            scheduler: self.scheduler.clone(),
            source_index: self.source_index,
        }
    }
}

impl<S: Clone + Send + 'static> FeedbackContext<S> {
    pub(crate) fn new(channel: StateChannel<S>, scheduler: Scheduler, source_index: usize) -> Self {
        Self {
            channel,
            scheduler,
            source_index,
        }
    }

    /// Current state first, then every state the loop publishes.
    pub fn states(&self) -> Values<S> {
        self.channel.subscribe().values()
    }

    /// Like [`states`](Self::states) but surfaces the loop's terminal error.
    pub fn subscribe(&self) -> StateSubscription<S> {
        self.channel.subscribe()
    }

    pub fn current(&self) -> Option<S> {
        self.channel.latest()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Position of this source in the loop's source list.
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    /// Run `observer` for every state on the designated context.
    /// Register the returned handle as a resource to stop it on teardown.
    pub fn observe<F>(&self, mut observer: F) -> Observation
    where
        F: FnMut(&S) + Send + 'static,
    {
        let mut states = self.states();
        let task = self.scheduler.spawn(async move {
            while let Some(state) = states.next().await {
                observer(&state);
            }
        });
        Observation { task }
    }
}

/// A spawned state observer. Releasing it stops the observer.
pub struct Observation {
    task: JoinHandle<()>,
}

impl Resource for Observation {
    fn release(self: Box<Self>) -> anyhow::Result<()> {
        self.task.abort();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cross-context event hop
// ---------------------------------------------------------------------------

/// Producer half of an [`event_channel`]. Cheap to clone and usable from
/// any thread, including non-async callbacks.
pub struct EventSender<E> {
    tx: mpsc::UnboundedSender<anyhow::Result<E>>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> EventSender<E> {
    /// Queue an event for the loop. Returns false once the loop has torn
    /// the source down; the event is discarded.
    pub fn send(&self, event: E) -> bool {
        let delivered = self.tx.send(Ok(event)).is_ok();
        if !delivered {
            trace!("Late event discarded, feedback source already torn down");
        }
        delivered
    }

    /// Fail the owning feedback source, and with it the loop.
    pub fn fail(&self, error: anyhow::Error) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Queue-backed event stream fed by [`EventSender`]s. The stream ends once
/// every sender is dropped.
pub fn event_channel<E: Send + 'static>() -> (EventSender<E>, EventStream<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();
    (EventSender { tx }, stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_channel_carries_events_from_other_threads() {
        let (sender, mut stream) = event_channel::<u32>();
        let worker = std::thread::spawn(move || {
            for i in 0..3 {
                assert!(sender.send(i));
            }
        });
        worker.join().unwrap();

        let mut seen = Vec::new();
        while let Some(item) = stream.next().await {
            seen.push(item.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn send_after_stream_dropped_is_discarded() {
        let (sender, stream) = event_channel::<&'static str>();
        drop(stream);
        assert!(sender.is_closed());
        assert!(!sender.send("late"));
    }

    #[tokio::test]
    async fn fail_yields_error_item() {
        let (sender, mut stream) = event_channel::<u8>();
        sender.fail(anyhow::anyhow!("listener lost"));
        drop(sender);

        let item = stream.next().await.unwrap();
        assert_eq!(item.unwrap_err().to_string(), "listener lost");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn observer_sees_current_state_then_updates() {
        let channel = StateChannel::new();
        channel.publish(1);
        let ctx = FeedbackContext::new(channel.clone(), Scheduler::current().unwrap(), 0);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let observation = ctx.observe(move |state: &i32| {
            let _ = tx.send(*state);
        });
        channel.publish(2);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));

        Box::new(observation).release().unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
