use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};

use crate::LogicalType;

/// An ordered, validated column list for one relation.
///
/// Column names are normalized to lowercase at construction and must be
/// unique after normalization. The declared order is preserved everywhere the
/// schema is rendered: in `SELECT` projections, in the arrow schema, and in
/// the parquet file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<(String, LogicalType)>,
}

impl ColumnSchema {
    /// Builds a schema from `(name, type)` pairs.
    ///
    /// Names are lowercased; an empty list or a duplicate normalized name is
    /// rejected, since a relation with no columns (or an ambiguous column)
    /// can never be resolved or published.
    pub fn new<I, S>(columns: I) -> Result<Self, InvalidSchemaError>
    where
        I: IntoIterator<Item = (S, LogicalType)>,
        S: Into<String>,
    {
        let mut normalized: Vec<(String, LogicalType)> = Vec::new();
        for (name, logical_type) in columns {
            let name = name.into().to_lowercase();
            if name.is_empty() {
                return Err(InvalidSchemaError::EmptyColumnName);
            }
            if normalized.iter().any(|(existing, _)| *existing == name) {
                return Err(InvalidSchemaError::DuplicateColumn { name });
            }
            normalized.push((name, logical_type));
        }
        if normalized.is_empty() {
            return Err(InvalidSchemaError::Empty);
        }
        Ok(Self {
            columns: normalized,
        })
    }

    /// Columns in declared order.
    pub fn columns(&self) -> &[(String, LogicalType)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Looks up a column's type by normalized name.
    pub fn get(&self, name: &str) -> Option<LogicalType> {
        let name = name.to_lowercase();
        self.columns
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, logical_type)| *logical_type)
    }

    /// Renders the declared columns as an arrow schema, order preserved.
    /// Every field is nullable: absent source columns surface as typed nulls.
    pub fn to_arrow(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|(name, logical_type)| Field::new(name, logical_type.arrow_data_type(), true))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

impl<'de> serde::Deserialize<'de> for ColumnSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let columns = Vec::<(String, LogicalType)>::deserialize(deserializer)?;
        ColumnSchema::new(columns).map_err(serde::de::Error::custom)
    }
}

/// Error type for [`ColumnSchema`] construction failures.
#[derive(Debug, thiserror::Error)]
pub enum InvalidSchemaError {
    /// The column list is empty.
    #[error("a relation schema must declare at least one column")]
    Empty,
    /// A column name is empty after normalization.
    #[error("column names cannot be empty")]
    EmptyColumnName,
    /// Two columns normalize to the same name.
    #[error("duplicate column name '{name}' after lowercase normalization")]
    DuplicateColumn { name: String },
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::DataType;

    use super::*;

    #[test]
    fn normalizes_names_and_preserves_order() {
        //* Given mixed-case column names
        let schema = ColumnSchema::new([
            ("Country_ID", LogicalType::String),
            ("YEAR", LogicalType::Int),
            ("value", LogicalType::Decimal),
        ])
        .unwrap();

        //* Then names are lowercased and order kept
        let names: Vec<&str> = schema.columns().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["country_id", "year", "value"]);
        assert_eq!(schema.get("Year"), Some(LogicalType::Int));
    }

    #[test]
    fn rejects_empty_schema() {
        let empty: [(&str, LogicalType); 0] = [];
        assert!(matches!(
            ColumnSchema::new(empty),
            Err(InvalidSchemaError::Empty)
        ));
    }

    #[test]
    fn rejects_duplicates_after_normalization() {
        //* Given two names that collide once lowercased
        let result = ColumnSchema::new([
            ("value", LogicalType::Decimal),
            ("VALUE", LogicalType::Float),
        ]);

        assert!(matches!(
            result,
            Err(InvalidSchemaError::DuplicateColumn { name }) if name == "value"
        ));
    }

    #[test]
    fn arrow_schema_matches_declared_columns() {
        let schema = ColumnSchema::new([
            ("indicator_id", LogicalType::String),
            ("year", LogicalType::Int64),
            ("value", LogicalType::Decimal),
            ("avg", LogicalType::Float),
        ])
        .unwrap();

        let arrow_schema = schema.to_arrow();
        assert_eq!(arrow_schema.fields().len(), 4);
        assert_eq!(arrow_schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(arrow_schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(
            arrow_schema.field(2).data_type(),
            &DataType::Decimal128(18, 3)
        );
        assert_eq!(arrow_schema.field(3).data_type(), &DataType::Float64);
        assert!(arrow_schema.fields().iter().all(|f| f.is_nullable()));
    }
}
