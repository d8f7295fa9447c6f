//! Shared primitives for the workspace.

pub mod retry;

pub use retry::{RetryPolicy, retry, retry_blocking};
