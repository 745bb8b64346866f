//! Wiring of channel, sources, aggregator and engine into one
//! running loop pinned to a scheduler.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};

use crate::aggregator::{Aggregator, SourcedEvent};
use crate::channel::{StateChannel, StateSubscription};
use crate::config::LoopConfig;
use crate::engine::ReductionEngine;
use crate::error::{LoopError, Result};
use crate::reducer::Reducer;
use crate::scheduler::Scheduler;
use crate::source::{FeedbackContext, FeedbackSource};

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Description of a feedback loop: seed, reducer, feedback sources.
///
/// Building a `System` does no work. Each [`start`](System::start) creates an
/// independent [`RunningLoop`] that publishes the seed first.
pub struct System<S, E> {
    seed: S,
    reducer: Arc<dyn Reducer<S, E>>,
    sources: Vec<Arc<dyn FeedbackSource<S, E>>>,
    scheduler: Option<Scheduler>,
    config: LoopConfig,
}

impl<S, E> System<S, E>
where
    S: Clone + Send + Sync + 'static,
    E: fmt::Debug + Send + 'static,
{
    pub fn new<R: Reducer<S, E>>(seed: S, reducer: R) -> Self {
        Self {
            seed,
            reducer: Arc::new(reducer),
            sources: Vec::new(),
            scheduler: None,
            config: LoopConfig::default(),
        }
    }

    pub fn with_feedback<F: FeedbackSource<S, E>>(mut self, source: F) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Pin the loop to `scheduler`. Defaults to the caller's runtime.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a new running loop.
    pub fn start(&self) -> Result<RunningLoop<S>> {
        let scheduler = match &self.scheduler {
            Some(scheduler) => scheduler.clone(),
            None => Scheduler::current()?,
        };

        let channel = StateChannel::new();
        let (stop_tx, stop_rx) = oneshot::channel();

        let actor = LoopActor {
            engine: ReductionEngine::new(
                self.seed.clone(),
                Arc::clone(&self.reducer),
                channel.clone(),
            )
            .with_trace_events(self.config.trace_events),
            sources: self.sources.clone(),
            channel: channel.clone(),
            scheduler: scheduler.clone(),
        };
        // Published before any source observes, so every subscriber's first
        // state is either the seed or a state folded from it.
        actor.engine.publish_seed();

        let span = tracing::info_span!("feedback_loop", name = %self.config.name);
        let task = scheduler.spawn(actor.run(stop_rx).instrument(span));

        Ok(RunningLoop {
            states: None,
            channel,
            stop: Some(stop_tx),
            task: Some(task),
        })
    }
}

// ---------------------------------------------------------------------------
// Loop actor
// ---------------------------------------------------------------------------

enum Outcome {
    Disposed,
    Exhausted,
    Failed(LoopError),
}

/// The single task that owns the current state. Merge, reduce and publish
/// all happen here, one event at a time.
struct LoopActor<S, E> {
    engine: ReductionEngine<S, E>,
    sources: Vec<Arc<dyn FeedbackSource<S, E>>>,
    channel: StateChannel<S>,
    scheduler: Scheduler,
}

impl<S, E> LoopActor<S, E>
where
    S: Clone + Send + Sync + 'static,
    E: fmt::Debug + Send + 'static,
{
    async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        let _guard = AbortGuard {
            channel: self.channel.clone(),
        };

        let mut aggregator = Aggregator::new();
        for (index, source) in self.sources.iter().enumerate() {
            let ctx = FeedbackContext::new(self.channel.clone(), self.scheduler.clone(), index);
            aggregator.push(index, source.observe(ctx));
        }

        info!(sources = self.sources.len(), "Feedback loop started");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut stop => break Outcome::Disposed,
                next = aggregator.next() => match next {
                    None => break Outcome::Exhausted,
                    Some(SourcedEvent { source_index, event: Err(e) }) => {
                        break Outcome::Failed(LoopError::feedback(source_index, e));
                    }
                    Some(SourcedEvent { event: Ok(event), .. }) => {
                        if let Err(e) = self.engine.apply(event) {
                            break Outcome::Failed(e);
                        }
                    }
                },
            }
        };

        // Release every source's resources before anyone hears about the end.
        drop(aggregator);

        let steps = self.engine.steps();
        match outcome {
            Outcome::Disposed => {
                info!(steps, "Feedback loop disposed");
                self.channel.complete();
            }
            Outcome::Exhausted => {
                info!(steps, "Feedback loop completed, every source ended");
                self.channel.complete();
            }
            Outcome::Failed(e) if self.channel.is_halted() => {
                info!(steps, error = %e, "Feedback loop disposed while failing");
                self.channel.complete();
            }
            Outcome::Failed(e) => {
                error!(steps, error = %e, "Feedback loop failed");
                self.channel.fail(e);
            }
        }
    }
}

/// Fails the channel if the actor stops without a terminal signal (task
/// aborted, runtime shut down, panic inside a feedback stream).
struct AbortGuard<S> {
    channel: StateChannel<S>,
}

impl<S> Drop for AbortGuard<S> {
    fn drop(&mut self) {
        if self.channel.fail(LoopError::Aborted) {
            error!("Feedback loop aborted");
        }
    }
}

// ---------------------------------------------------------------------------
// RunningLoop
// ---------------------------------------------------------------------------

/// A live loop. As a stream it yields the state current at its first poll
/// (the seed, unless the loop has already moved on), then every new state,
/// and ends after completion or with the loop's terminal error.
///
/// The stream subscribes on first poll, so a loop that is only read through
/// [`current`](Self::current) or [`subscribe`](Self::subscribe) buffers
/// nothing for it.
///
/// Dropping it disposes the loop.
pub struct RunningLoop<S> {
    states: Option<StateSubscription<S>>,
    channel: StateChannel<S>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<S: Clone + Send + 'static> RunningLoop<S> {
    /// Attach another observer (a renderer, say). It starts at the current
    /// state, never earlier ones.
    pub fn subscribe(&self) -> StateSubscription<S> {
        self.channel.subscribe()
    }

    pub fn current(&self) -> Option<S> {
        self.channel.latest()
    }
}

impl<S> RunningLoop<S> {
    /// Stop the loop. No state is published once this returns; sources are
    /// torn down asynchronously, use [`shutdown`](Self::shutdown) to wait
    /// for that.
    pub fn dispose(&mut self) {
        if let Some(stop) = self.stop.take() {
            self.channel.halt();
            let _ = stop.send(());
        }
    }

    /// Dispose and wait until every feedback source has been torn down.
    pub async fn shutdown(mut self) {
        self.dispose();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "Feedback loop task panicked");
                }
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.channel.is_terminated()
    }
}

impl<S: Clone> Stream for RunningLoop<S> {
    type Item = Result<S>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let channel = &this.channel;
        this.states
            .get_or_insert_with(|| channel.subscribe())
            .poll_next_unpin(cx)
    }
}

impl<S> Drop for RunningLoop<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
