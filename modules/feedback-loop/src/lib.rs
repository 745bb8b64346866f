//! Unidirectional state-feedback loop.
//!
//! A loop is a seed state, a pure reducer and a set of feedback sources.
//! Sources observe the evolving state and emit events; the loop merges those
//! events and folds them, one at a time, into the next state:
//!
//! ```text
//! StateChannel ──► FeedbackSource A ──┐
//!      ▲       └─► FeedbackSource B ──┤
//!      │                              ▼
//!      └──── publish ◄── reduce ◄── Aggregator
//! ```
//!
//! Merge, reduce and publish run as a single task on one [`Scheduler`], so
//! state is only ever touched by one writer. Every source sees the same state
//! sequence; events keep their order within a source, but the interleaving
//! between sources is unspecified.
//!
//! Any reducer or source failure terminates the loop for every subscriber.
//! There is no retry and no per-source isolation.

pub mod aggregator;
pub mod channel;
pub mod combinators;
pub mod config;
pub mod engine;
pub mod error;
pub mod reducer;
pub mod resource;
pub mod scheduler;
pub mod source;
pub mod system;

pub use aggregator::{Aggregator, SourcedEvent};
pub use channel::{StateChannel, StateSubscription, Values};
pub use combinators::{bind, react, Bind, Bindings, React, ReactPolicy};
pub use config::LoopConfig;
pub use engine::ReductionEngine;
pub use error::{LoopError, Result};
pub use reducer::{from_fn, try_from_fn, Reducer};
pub use resource::{on_release, Resource, ResourceSet};
pub use scheduler::Scheduler;
pub use source::{
    event_channel, events, EventSender, EventStream, FeedbackContext, FeedbackSource, Observation,
};
pub use system::{RunningLoop, System};
