//! Merges every feedback source into one stream.
//!
//! Guarantees: events from one source keep that source's order, and no
//! event is lost. Non-guarantee: the interleaving between different sources
//! is unspecified and may differ from run to run.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, SelectAll, Stream, StreamExt};

use crate::source::EventStream;

/// One merged item, tagged with the index of the source that produced it.
#[derive(Debug)]
pub struct SourcedEvent<E> {
    pub source_index: usize,
    pub event: anyhow::Result<E>,
}

pub struct Aggregator<E> {
    merged: SelectAll<BoxStream<'static, SourcedEvent<E>>>,
}

impl<E: Send + 'static> Default for Aggregator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + 'static> Aggregator<E> {
    pub fn new() -> Self {
        Self {
            merged: SelectAll::new(),
        }
    }

    pub fn push(&mut self, source_index: usize, events: EventStream<E>) {
        self.merged.push(
            events
                .map(move |event| SourcedEvent {
                    source_index,
                    event,
                })
                .boxed(),
        );
    }

    /// Sources whose streams have not ended yet. Ended streams are dropped
    /// (and their resources released) as soon as they finish.
    pub fn active(&self) -> usize {
        self.merged.len()
    }
}

impl<E> Stream for Aggregator<E> {
    type Item = SourcedEvent<E>;

    /// Yields `None` once every source has ended.
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.merged.poll_next_unpin(cx)
    }
}
