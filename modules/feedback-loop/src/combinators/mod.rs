//! Higher-order builders for composing feedback sources.

pub mod bind;
pub mod react;

pub use bind::{bind, Bind, Bindings};
pub use react::{react, React, ReactPolicy};
