//! Workspace observability setup.

pub mod logging;
