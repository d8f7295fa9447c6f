use std::collections::BTreeMap;

use crate::{ColumnSchema, LogicalType};

/// Explicit mapping from source name to declared relation schema.
///
/// The registry is populated at startup (built-in set plus programmatic
/// inserts) and read-only afterwards. Lookups never touch the filesystem or
/// the warehouse.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, ColumnSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry pre-populated with the shipped indicator sources and the
    /// consolidated master relation.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        // UIS-style indicator sources share one shape.
        for name in ["opri", "sdg", "edu"] {
            registry.insert(name, indicator_source_schema());
        }

        registry.insert("wdi", wdi_schema());
        registry.insert("wdi_country_averages", wdi_country_averages_schema());
        registry.insert("indicators", master_indicators_schema());
        registry.insert("all_models", metadata_models_schema());

        registry
    }

    /// Registers (or replaces) a schema under `name`, lowercased.
    pub fn insert(&mut self, name: impl Into<String>, schema: ColumnSchema) {
        self.schemas.insert(name.into().to_lowercase(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        self.schemas.get(&name.to_lowercase())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn indicator_source_schema() -> ColumnSchema {
    ColumnSchema::new([
        ("indicator_id", LogicalType::String),
        ("country_id", LogicalType::String),
        ("year", LogicalType::Int),
        ("value", LogicalType::Decimal),
        ("magnitude", LogicalType::String),
        ("qualifier", LogicalType::String),
        ("indicator_description", LogicalType::String),
    ])
    .unwrap_or_else(|_| unreachable!("builtin schema is statically valid"))
}

fn wdi_schema() -> ColumnSchema {
    ColumnSchema::new([
        ("country_id", LogicalType::String),
        ("indicator_id", LogicalType::String),
        ("year", LogicalType::Int),
        ("value", LogicalType::Decimal),
        ("magnitude", LogicalType::String),
        ("qualifier", LogicalType::String),
        ("indicator_description", LogicalType::String),
    ])
    .unwrap_or_else(|_| unreachable!("builtin schema is statically valid"))
}

fn wdi_country_averages_schema() -> ColumnSchema {
    ColumnSchema::new([
        ("country_id", LogicalType::String),
        ("indicator_id", LogicalType::String),
        ("year", LogicalType::Int),
        ("value", LogicalType::Decimal),
        ("magnitude", LogicalType::String),
        ("qualifier", LogicalType::String),
        ("indicator_description", LogicalType::String),
        ("avg_value_by_country", LogicalType::Float),
    ])
    .unwrap_or_else(|_| unreachable!("builtin schema is statically valid"))
}

/// Model catalog published alongside the data: one row per model with its
/// rendered properties.
fn metadata_models_schema() -> ColumnSchema {
    ColumnSchema::new([
        ("model_name", LogicalType::String),
        ("model_description", LogicalType::String),
        ("model_kind", LogicalType::String),
        ("grain", LogicalType::String),
        ("columns", LogicalType::String),
        ("column_descriptions", LogicalType::String),
        ("physical_properties", LogicalType::String),
    ])
    .unwrap_or_else(|_| unreachable!("builtin schema is statically valid"))
}

fn master_indicators_schema() -> ColumnSchema {
    ColumnSchema::new([
        ("indicator_id", LogicalType::String),
        ("country_id", LogicalType::String),
        ("year", LogicalType::Int64),
        ("value", LogicalType::Decimal),
        ("magnitude", LogicalType::String),
        ("qualifier", LogicalType::String),
        ("indicator_description", LogicalType::String),
        ("source", LogicalType::String),
    ])
    .unwrap_or_else(|_| unreachable!("builtin schema is statically valid"))
}
