//! The designated execution context a loop is pinned to.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::thread;

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{LoopError, Result};

/// Where the merge → reduce → publish pipeline runs.
///
/// A loop is a single task spawned on this scheduler's runtime, so its
/// pipeline is never polled concurrently with itself. `dedicated` goes
/// further and confines everything to one OS thread.
#[derive(Clone)]
pub struct Scheduler {
    handle: Handle,
    thread: Option<Arc<DedicatedThread>>,
}

impl Scheduler {
    /// The runtime the caller is currently inside.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| LoopError::NoRuntime(e.to_string()))?;
        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            thread: None,
        }
    }

    /// Spin up a named OS thread driving a current-thread runtime.
    /// The thread exits when the last clone of this scheduler is dropped.
    pub fn dedicated(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (handle_tx, handle_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread_name = name.clone();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = handle_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = handle_tx.send(Ok(runtime.handle().clone()));
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
                debug!(thread = %thread_name, "Dedicated scheduler stopped");
            })
            .map_err(|e| LoopError::Scheduler(e.to_string()))?;

        let handle = handle_rx
            .recv()
            .map_err(|e| LoopError::Scheduler(e.to_string()))?
            .map_err(LoopError::Scheduler)?;

        info!(thread = %name, "Dedicated scheduler started");

        Ok(Self {
            handle,
            thread: Some(Arc::new(DedicatedThread {
                name,
                stop: Some(stop_tx),
            })),
        })
    }

    /// Run `future` on this scheduler.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Name of the dedicated thread, if this scheduler owns one.
    pub fn thread_name(&self) -> Option<&str> {
        self.thread.as_deref().map(|t| t.name.as_str())
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("dedicated", &self.thread_name())
            .finish()
    }
}

struct DedicatedThread {
    name: String,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for DedicatedThread {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_requires_a_runtime() {
        assert!(matches!(Scheduler::current(), Err(LoopError::NoRuntime(_))));
    }

    #[test]
    fn dedicated_scheduler_runs_tasks_on_its_thread() {
        let scheduler = Scheduler::dedicated("feedback-sched-test").unwrap();
        assert_eq!(scheduler.thread_name(), Some("feedback-sched-test"));

        let (tx, rx) = std::sync::mpsc::channel();
        scheduler.spawn(async move {
            let name = thread::current().name().map(str::to_string);
            let _ = tx.send(name);
        });

        let name = rx.recv().unwrap();
        assert_eq!(name.as_deref(), Some("feedback-sched-test"));
    }
}
