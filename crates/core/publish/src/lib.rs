//! Destination path resolution and parquet publication.

mod path;
mod publisher;

pub use path::{PathResolutionError, PublicationTarget};
pub use publisher::{PublicationError, publish};
