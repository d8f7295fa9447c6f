//! Embedded warehouse access and schema-safe relation resolution.
//!
//! The warehouse is a single duckdb file produced by the upstream build. It
//! may be missing, stale, or carry tables that drifted from their declared
//! schemas; the resolver in this crate absorbs all of that and always hands
//! back a relation with exactly the declared column list.

mod location;
mod relation;
mod resolver;

pub use location::{WarehouseLocation, WarehouseLocationError};
pub use relation::ResolvedRelation;
pub use resolver::{ResolveError, Resolver};
