//! Disposable resources owned by feedback sources.

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::anyhow;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::channel::StateSubscription;
use crate::error::panic_message;

/// A running effect (listener registration, spawned observer, ...) that
/// must be released when its feedback source stops participating.
///
/// `release` consumes the resource, so it can run at most once.
pub trait Resource: Send + 'static {
    fn release(self: Box<Self>) -> anyhow::Result<()>;
}

/// Resource backed by a release closure.
pub struct OnRelease<F>(F);

/// Wrap `f` as a [`Resource`] invoked on release.
pub fn on_release<F>(f: F) -> OnRelease<F>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    OnRelease(f)
}

impl<F> Resource for OnRelease<F>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    fn release(self: Box<Self>) -> anyhow::Result<()> {
        let OnRelease(f) = *self;
        f()
    }
}

impl<T: Send + 'static> Resource for JoinHandle<T> {
    fn release(self: Box<Self>) -> anyhow::Result<()> {
        self.abort();
        Ok(())
    }
}

impl<S: Send + 'static> Resource for StateSubscription<S> {
    fn release(self: Box<Self>) -> anyhow::Result<()> {
        drop(self);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ResourceSet
// ---------------------------------------------------------------------------

/// Owns a bundle of resources and guarantees each is released exactly once,
/// either through [`ResourceSet::release_all`] or when the set is dropped.
///
/// A failing (or panicking) release never prevents the others from running.
/// On the drop path failures are logged and swallowed.
#[derive(Default)]
pub struct ResourceSet {
    resources: Vec<Box<dyn Resource>>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: Box<dyn Resource>) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Release everything still held, in acquisition order. Returns the
    /// failures; a second call is a no-op.
    pub fn release_all(&mut self) -> Vec<anyhow::Error> {
        let mut failures = Vec::new();
        for resource in self.resources.drain(..) {
            let outcome = catch_unwind(AssertUnwindSafe(move || resource.release()));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(payload) => failures.push(anyhow!(
                    "resource release panicked: {}",
                    panic_message(payload.as_ref())
                )),
            }
        }
        failures
    }
}

impl FromIterator<Box<dyn Resource>> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = Box<dyn Resource>>>(iter: I) -> Self {
        Self {
            resources: iter.into_iter().collect(),
        }
    }
}

impl Drop for ResourceSet {
    fn drop(&mut self) {
        for e in self.release_all() {
            warn!(error = %e, "Resource teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> Box<dyn Resource> {
        let counter = Arc::clone(counter);
        Box::new(on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    #[test]
    fn drop_releases_each_resource_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut set = ResourceSet::new();
        set.push(counting(&counter));
        set.push(counting(&counter));

        assert!(set.release_all().is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        drop(set);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_release_does_not_block_the_rest() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut set: ResourceSet = vec![
            counting(&counter),
            Box::new(on_release(|| Err(anyhow!("listener already detached")))) as Box<dyn Resource>,
            Box::new(on_release(|| panic!("detach exploded"))) as Box<dyn Resource>,
            counting(&counter),
        ]
        .into_iter()
        .collect();

        let failures = set.release_all();
        assert_eq!(failures.len(), 2);
        assert!(failures[1].to_string().contains("detach exploded"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn join_handle_release_aborts_task() {
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await
        });
        let mut set = ResourceSet::new();
        set.push(Box::new(handle));
        drop(set);

        // The sender is only dropped once the aborted task is torn down.
        assert!(alive_rx.await.is_err());
    }
}
