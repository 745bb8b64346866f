//! Strictly serialized left fold over merged events.
//!
//! Each step reduces one event and publishes the result to the state
//! channel before the caller may draw the next event. The engine never
//! calls back into the aggregator, so a step can't re-enter itself.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::channel::StateChannel;
use crate::error::{LoopError, Result};
use crate::reducer::Reducer;

pub struct ReductionEngine<S, E> {
    /// `None` once a step has failed; the engine is inert from then on.
    state: Option<S>,
    reducer: Arc<dyn Reducer<S, E>>,
    channel: StateChannel<S>,
    steps: u64,
    trace_events: bool,
}

impl<S, E> ReductionEngine<S, E>
where
    S: Clone + Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    pub fn new(seed: S, reducer: Arc<dyn Reducer<S, E>>, channel: StateChannel<S>) -> Self {
        Self {
            state: Some(seed),
            reducer,
            channel,
            steps: 0,
            trace_events: false,
        }
    }

    pub fn with_trace_events(mut self, trace_events: bool) -> Self {
        self.trace_events = trace_events;
        self
    }

    /// Publish the seed. Must run before the first event is applied.
    pub fn publish_seed(&self) {
        if let Some(state) = &self.state {
            self.channel.publish(state.clone());
        }
    }

    /// Reduce `event` into the current state and publish the result.
    ///
    /// On failure nothing is published and the engine stays inert; the
    /// caller is expected to terminate the loop with the returned error.
    pub fn apply(&mut self, event: E) -> Result<&S> {
        let state = self.state.take().ok_or(LoopError::Aborted)?;

        if self.trace_events {
            debug!(step = self.steps + 1, event = ?event, "Applying event");
        }

        let reducer = &self.reducer;
        let next = match catch_unwind(AssertUnwindSafe(|| reducer.reduce(state, event))) {
            Ok(Ok(next)) => next,
            Ok(Err(e)) => return Err(LoopError::reduction(e)),
            Err(payload) => return Err(LoopError::from_panic(payload)),
        };

        self.steps += 1;
        self.channel.publish(next.clone());
        Ok(self.state.insert(next))
    }

    pub fn state(&self) -> Option<&S> {
        self.state.as_ref()
    }

    /// Events successfully applied so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}
