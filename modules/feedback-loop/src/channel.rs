//! Replay-of-one broadcast of the loop's state.
//!
//! Holds the last published state plus an explicit subscriber list. Every
//! subscriber owns a FIFO mailbox; `publish` enqueues into all of them before
//! returning, so no subscriber can miss or reorder a state. A new subscriber
//! is handed the latest state first, then everything published after it.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::LoopError;

// ---------------------------------------------------------------------------
// StateChannel
// ---------------------------------------------------------------------------

enum Delivery<S> {
    State(S),
    Failed(LoopError),
}

enum Terminal {
    Completed,
    Failed(LoopError),
}

struct Subscriber<S> {
    id: u64,
    tx: mpsc::UnboundedSender<Delivery<S>>,
}

struct Shared<S> {
    latest: Option<S>,
    subscribers: Vec<Subscriber<S>>,
    next_id: u64,
    /// Set by [`StateChannel::halt`]: publication has stopped, termination
    /// is still pending.
    halted: bool,
    terminal: Option<Terminal>,
}

fn lock<S>(shared: &Mutex<Shared<S>>) -> MutexGuard<'_, Shared<S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Multicast channel that replays its latest value to new subscribers.
pub struct StateChannel<S> {
    shared: Arc<Mutex<Shared<S>>>,
}

impl<S> Clone for StateChannel<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Clone> Default for StateChannel<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone> StateChannel<S> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                latest: None,
                subscribers: Vec::new(),
                next_id: 0,
                halted: false,
                terminal: None,
            })),
        }
    }

    /// Make `state` the current state and fan it out to every subscriber.
    /// Returns the number of subscribers reached. Ignored once halted or
    /// terminated.
    pub fn publish(&self, state: S) -> usize {
        let mut guard = lock(&self.shared);
        let shared = &mut *guard;

        if shared.terminal.is_some() {
            warn!("State published after the channel terminated, ignoring");
            return 0;
        }
        if shared.halted {
            trace!("State published after the channel halted, discarding");
            return 0;
        }

        shared
            .subscribers
            .retain(|sub| sub.tx.send(Delivery::State(state.clone())).is_ok());
        shared.latest = Some(state);
        shared.subscribers.len()
    }

    /// Attach a new subscriber. The latest state (if any) is queued before
    /// anything published afterwards; with no state yet, the subscriber
    /// simply waits for the first publish.
    pub fn subscribe(&self) -> StateSubscription<S> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = lock(&self.shared);
        let shared = &mut *guard;

        if let Some(latest) = &shared.latest {
            let _ = tx.send(Delivery::State(latest.clone()));
        }

        let id = shared.next_id;
        shared.next_id += 1;

        match &shared.terminal {
            None => shared.subscribers.push(Subscriber { id, tx }),
            Some(Terminal::Failed(error)) => {
                let _ = tx.send(Delivery::Failed(error.clone()));
            }
            // Sender dropped here: the stream ends after the replay.
            Some(Terminal::Completed) => {}
        }

        StateSubscription {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn latest(&self) -> Option<S> {
        lock(&self.shared).latest.clone()
    }
}

impl<S> StateChannel<S> {
    /// Stop publication without terminating. Once this returns no further
    /// state reaches any subscriber; `complete` or `fail` still end the
    /// streams later.
    pub fn halt(&self) {
        lock(&self.shared).halted = true;
    }

    pub fn is_halted(&self) -> bool {
        lock(&self.shared).halted
    }

    /// End every subscription normally. Returns false if already terminated.
    pub fn complete(&self) -> bool {
        let mut shared = lock(&self.shared);
        if shared.terminal.is_some() {
            return false;
        }
        shared.terminal = Some(Terminal::Completed);
        shared.subscribers.clear();
        true
    }

    /// Deliver `error` to every subscriber and end their streams.
    /// Returns false if already terminated.
    pub fn fail(&self, error: LoopError) -> bool {
        let mut shared = lock(&self.shared);
        if shared.terminal.is_some() {
            return false;
        }
        for sub in shared.subscribers.drain(..) {
            let _ = sub.tx.send(Delivery::Failed(error.clone()));
        }
        shared.terminal = Some(Terminal::Failed(error));
        true
    }

    pub fn is_terminated(&self) -> bool {
        lock(&self.shared).terminal.is_some()
    }

    /// Live subscribers (mailboxes whose receiver is still held).
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared)
            .subscribers
            .iter()
            .filter(|sub| !sub.tx.is_closed())
            .count()
    }
}

// ---------------------------------------------------------------------------
// StateSubscription
// ---------------------------------------------------------------------------

/// One subscriber's view of the channel. Dropping it unsubscribes.
pub struct StateSubscription<S> {
    id: u64,
    rx: mpsc::UnboundedReceiver<Delivery<S>>,
    shared: Weak<Mutex<Shared<S>>>,
}

impl<S> StateSubscription<S> {
    /// Plain states, ending at termination whether normal or failed.
    pub fn values(self) -> Values<S> {
        Values { inner: Some(self) }
    }
}

impl<S> Stream for StateSubscription<S> {
    type Item = Result<S, LoopError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|delivery| {
            delivery.map(|d| match d {
                Delivery::State(state) => Ok(state),
                Delivery::Failed(error) => Err(error),
            })
        })
    }
}

impl<S> Drop for StateSubscription<S> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let id = self.id;
            lock(&shared).subscribers.retain(|sub| sub.id != id);
        }
    }
}

/// States only; see [`StateSubscription::values`].
pub struct Values<S> {
    inner: Option<StateSubscription<S>>,
}

impl<S> Stream for Values<S> {
    type Item = S;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(inner).poll_next(cx) {
            Poll::Ready(Some(Ok(state))) => Poll::Ready(Some(state)),
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => {
                self.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
