use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoopError>;

/// Terminal failure of a running loop.
///
/// Cloned to every subscriber of the state stream, so wrapped errors are
/// shared behind `Arc`.
#[derive(Error, Debug, Clone)]
pub enum LoopError {
    #[error("Reduction failed: {0}")]
    Reduction(Arc<anyhow::Error>),

    #[error("Reducer panicked: {0}")]
    ReducerPanicked(String),

    #[error("Feedback source {source_index} failed: {error}")]
    Feedback {
        source_index: usize,
        error: Arc<anyhow::Error>,
    },

    #[error("Loop aborted before reaching a terminal state")]
    Aborted,

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl LoopError {
    pub fn reduction(error: anyhow::Error) -> Self {
        LoopError::Reduction(Arc::new(error))
    }

    pub fn feedback(source_index: usize, error: anyhow::Error) -> Self {
        LoopError::Feedback {
            source_index,
            error: Arc::new(error),
        }
    }

    /// Build a `ReducerPanicked` from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        LoopError::ReducerPanicked(panic_message(payload.as_ref()))
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_error_names_source() {
        let err = LoopError::feedback(2, anyhow::anyhow!("listener gone"));
        assert_eq!(err.to_string(), "Feedback source 2 failed: listener gone");
    }

    #[test]
    fn cloned_error_shares_cause() {
        let err = LoopError::reduction(anyhow::anyhow!("bad event"));
        let copy = err.clone();
        match (err, copy) {
            (LoopError::Reduction(a), LoopError::Reduction(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected reduction errors"),
        }
    }

    #[test]
    fn panic_payloads_become_messages() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("static");
        let other: Box<dyn std::any::Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
