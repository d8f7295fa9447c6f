//! Logical schemas for published relations.
//!
//! Declared schemas are the source of truth for what a published relation
//! looks like: the warehouse resolver conforms whatever it finds (or does not
//! find) to these column lists, and the publisher writes exactly this shape.

mod column_schema;
mod logical_type;
mod registry;
mod table_identity;

pub use column_schema::{ColumnSchema, InvalidSchemaError};
pub use logical_type::LogicalType;
pub use registry::SchemaRegistry;
pub use table_identity::{TableIdentity, TableIdentityError};
