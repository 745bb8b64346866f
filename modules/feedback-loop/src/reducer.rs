//! The reduction function contract.

/// Pure `(state, event) -> state` step. No I/O, no side effects, and no
/// re-entry into the loop: follow-up behaviour belongs in a feedback source.
///
/// Returning `Err` (or panicking) is a reduction failure and terminates the
/// loop.
pub trait Reducer<S, E>: Send + Sync + 'static {
    fn reduce(&self, state: S, event: E) -> anyhow::Result<S>;
}

/// Reducer built from an infallible closure. See [`from_fn`].
pub struct FnReducer<F>(F);

/// Reducer built from a fallible closure. See [`try_from_fn`].
pub struct TryFnReducer<F>(F);

pub fn from_fn<S, E, F>(f: F) -> FnReducer<F>
where
    F: Fn(S, E) -> S + Send + Sync + 'static,
{
    FnReducer(f)
}

pub fn try_from_fn<S, E, F>(f: F) -> TryFnReducer<F>
where
    F: Fn(S, E) -> anyhow::Result<S> + Send + Sync + 'static,
{
    TryFnReducer(f)
}

impl<S, E, F> Reducer<S, E> for FnReducer<F>
where
    F: Fn(S, E) -> S + Send + Sync + 'static,
{
    fn reduce(&self, state: S, event: E) -> anyhow::Result<S> {
        Ok((self.0)(state, event))
    }
}

impl<S, E, F> Reducer<S, E> for TryFnReducer<F>
where
    F: Fn(S, E) -> anyhow::Result<S> + Send + Sync + 'static,
{
    fn reduce(&self, state: S, event: E) -> anyhow::Result<S> {
        (self.0)(state, event)
    }
}
