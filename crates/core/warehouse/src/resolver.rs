use std::{collections::HashSet, path::Path, sync::Arc};

use arrow::array::{
    ArrayRef, Decimal128Builder, Float64Builder, Int32Builder, Int64Builder, RecordBatch,
    StringBuilder,
};
use duckdb::{AccessMode, Config, Connection, Row};
use relpub_common::{RetryPolicy, retry_blocking};
use relpub_schema::{ColumnSchema, LogicalType, TableIdentity};
use tracing::{debug, warn};

use crate::{ResolvedRelation, WarehouseLocation};

/// Resolves declared relations against the embedded warehouse.
///
/// Resolution always yields a relation with exactly the declared schema. A
/// missing warehouse file, a missing table, or a value that cannot be cast to
/// its declared type all degrade to a typed empty relation; the only hard
/// error is a declared schema that is itself unusable.
pub struct Resolver {
    location: WarehouseLocation,
    retry: RetryPolicy,
}

impl Resolver {
    pub fn new(location: WarehouseLocation) -> Self {
        Self {
            location,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Materializes `identity` conformed to `schema`.
    ///
    /// Present source columns are cast to their declared types, absent ones
    /// are synthesized as typed nulls, and extra source columns are
    /// discarded. Declared column order is preserved.
    pub fn resolve(
        &self,
        identity: &TableIdentity,
        schema: &ColumnSchema,
    ) -> Result<ResolvedRelation, ResolveError> {
        if schema.is_empty() {
            return Err(ResolveError::InvalidSchema {
                identity: identity.clone(),
            });
        }

        let Some(path) = self.location.locate() else {
            warn!("no warehouse file found, resolving {identity} as an empty relation");
            return Ok(ResolvedRelation::empty(schema));
        };

        match self.fetch(&path, identity, schema) {
            Ok(Some(batch)) => {
                debug!("resolved {identity} with {} rows", batch.num_rows());
                Ok(ResolvedRelation::Bound(batch))
            }
            Ok(None) => {
                debug!("table {identity} not present in warehouse, resolving as empty");
                Ok(ResolvedRelation::empty(schema))
            }
            Err(err) => {
                warn!("falling back to an empty relation for {identity}: {err}");
                Ok(ResolvedRelation::empty(schema))
            }
        }
    }

    /// Reads the backing table, or `None` when it does not exist.
    fn fetch(
        &self,
        path: &Path,
        identity: &TableIdentity,
        schema: &ColumnSchema,
    ) -> Result<Option<RecordBatch>, FetchError> {
        let conn = retry_blocking(&self.retry, "warehouse connection", |_| true, || {
            let config = Config::default().access_mode(AccessMode::ReadOnly)?;
            Connection::open_with_flags(path, config)
        })
        .map_err(FetchError::Connect)?;

        let present = source_columns(&conn, identity).map_err(FetchError::Query)?;
        if present.is_empty() {
            return Ok(None);
        }

        let sql = projection_sql(identity, schema, &present);
        let mut builders: Vec<ColumnBuilder> = schema
            .columns()
            .iter()
            .map(|(_, logical_type)| ColumnBuilder::new(*logical_type))
            .collect();

        let mut stmt = conn.prepare(&sql).map_err(FetchError::Query)?;
        let mut rows = stmt.query([]).map_err(FetchError::Query)?;
        while let Some(row) = rows.next().map_err(FetchError::Query)? {
            for (index, (name, _)) in schema.columns().iter().enumerate() {
                builders[index].append(row, index, name)?;
            }
        }

        let arrays: Vec<ArrayRef> = builders.into_iter().map(ColumnBuilder::finish).collect();
        RecordBatch::try_new(schema.to_arrow(), arrays)
            .map(Some)
            .map_err(FetchError::Arrow)
    }
}

/// Lowercased column names the backing table actually has. Empty when the
/// table does not exist.
fn source_columns(
    conn: &Connection,
    identity: &TableIdentity,
) -> Result<HashSet<String>, duckdb::Error> {
    let mut stmt = conn.prepare(
        "SELECT lower(column_name) FROM information_schema.columns \
         WHERE lower(table_schema) = ? AND lower(table_name) = ?",
    )?;
    let mut rows = stmt.query(duckdb::params![identity.schema(), identity.table()])?;
    let mut present = HashSet::new();
    while let Some(row) = rows.next()? {
        present.insert(row.get::<_, String>(0)?);
    }
    Ok(present)
}

/// Renders the conforming projection.
///
/// Decimal columns are read through a VARCHAR cast: duckdb renders
/// `DECIMAL(18,3)` with a fixed textual shape, which the row reader parses
/// back into scaled i128 values without any float round-trip.
fn projection_sql(
    identity: &TableIdentity,
    schema: &ColumnSchema,
    present: &HashSet<String>,
) -> String {
    let exprs: Vec<String> = schema
        .columns()
        .iter()
        .map(|(name, logical_type)| {
            let read_type = match logical_type {
                LogicalType::Decimal => "VARCHAR",
                other => other.sql_type_name(),
            };
            if present.contains(name) {
                match logical_type {
                    LogicalType::Decimal => format!(
                        "CAST(CAST(\"{name}\" AS DECIMAL(18,3)) AS VARCHAR) AS \"{name}\""
                    ),
                    _ => format!("CAST(\"{name}\" AS {read_type}) AS \"{name}\""),
                }
            } else {
                format!("CAST(NULL AS {read_type}) AS \"{name}\"")
            }
        })
        .collect();

    let table = match identity.catalog() {
        Some(catalog) => format!("\"{catalog}\".\"{}\".\"{}\"", identity.schema(), identity.table()),
        None => format!("\"{}\".\"{}\"", identity.schema(), identity.table()),
    };

    format!("SELECT {} FROM {table}", exprs.join(", "))
}

/// Parses duckdb's textual rendering of a `DECIMAL(18,3)` value into the
/// scaled i128 representation arrow expects.
fn parse_decimal_18_3(text: &str) -> Option<i128> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > 3 {
        return None;
    }

    let mut scaled: i128 = 0;
    for c in int_part.chars() {
        scaled = scaled
            .checked_mul(10)?
            .checked_add(c.to_digit(10)? as i128)?;
    }
    for c in frac_part.chars() {
        scaled = scaled
            .checked_mul(10)?
            .checked_add(c.to_digit(10)? as i128)?;
    }
    for _ in frac_part.len()..3 {
        scaled = scaled.checked_mul(10)?;
    }

    Some(if negative { -scaled } else { scaled })
}

/// Per-column array builder matching the declared logical type.
enum ColumnBuilder {
    String(StringBuilder),
    Int(Int32Builder),
    Int64(Int64Builder),
    Decimal(Decimal128Builder),
    Float(Float64Builder),
}

impl ColumnBuilder {
    fn new(logical_type: LogicalType) -> Self {
        match logical_type {
            LogicalType::String => ColumnBuilder::String(StringBuilder::new()),
            LogicalType::Int => ColumnBuilder::Int(Int32Builder::new()),
            LogicalType::Int64 => ColumnBuilder::Int64(Int64Builder::new()),
            LogicalType::Decimal => ColumnBuilder::Decimal(
                Decimal128Builder::new().with_data_type(LogicalType::Decimal.arrow_data_type()),
            ),
            LogicalType::Float => ColumnBuilder::Float(Float64Builder::new()),
        }
    }

    fn append(&mut self, row: &Row<'_>, index: usize, name: &str) -> Result<(), FetchError> {
        match self {
            ColumnBuilder::String(builder) => {
                builder.append_option(
                    row.get::<_, Option<String>>(index)
                        .map_err(FetchError::Query)?,
                );
            }
            ColumnBuilder::Int(builder) => {
                builder.append_option(
                    row.get::<_, Option<i32>>(index).map_err(FetchError::Query)?,
                );
            }
            ColumnBuilder::Int64(builder) => {
                builder.append_option(
                    row.get::<_, Option<i64>>(index).map_err(FetchError::Query)?,
                );
            }
            ColumnBuilder::Decimal(builder) => {
                match row
                    .get::<_, Option<String>>(index)
                    .map_err(FetchError::Query)?
                {
                    None => builder.append_null(),
                    Some(text) => match parse_decimal_18_3(&text) {
                        Some(scaled) => builder.append_value(scaled),
                        None => {
                            return Err(FetchError::Decimal {
                                column: name.to_string(),
                                value: text,
                            });
                        }
                    },
                }
            }
            ColumnBuilder::Float(builder) => {
                builder.append_option(
                    row.get::<_, Option<f64>>(index).map_err(FetchError::Query)?,
                );
            }
        }
        Ok(())
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::String(mut builder) => Arc::new(builder.finish()),
            ColumnBuilder::Int(mut builder) => Arc::new(builder.finish()),
            ColumnBuilder::Int64(mut builder) => Arc::new(builder.finish()),
            ColumnBuilder::Decimal(mut builder) => Arc::new(builder.finish()),
            ColumnBuilder::Float(mut builder) => Arc::new(builder.finish()),
        }
    }
}

/// Error type for resolution failures that cannot be absorbed.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The declared schema has no columns; there is no shape to conform to.
    #[error("relation {identity} has an empty declared schema")]
    InvalidSchema { identity: TableIdentity },
}

/// Internal infrastructure failures. These are logged and absorbed into an
/// empty relation by [`Resolver::resolve`].
#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("failed to open warehouse: {0}")]
    Connect(#[source] duckdb::Error),
    #[error("warehouse query failed: {0}")]
    Query(#[source] duckdb::Error),
    #[error("column '{column}' value '{value}' is not a valid decimal")]
    Decimal { column: String, value: String },
    #[error("failed to assemble record batch: {0}")]
    Arrow(#[source] arrow::error::ArrowError),
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use arrow::array::{Array, Decimal128Array, Int32Array, StringArray};
    use relpub_schema::LogicalType;

    use super::*;

    fn wdi_schema() -> ColumnSchema {
        ColumnSchema::new([
            ("country_id", LogicalType::String),
            ("indicator_id", LogicalType::String),
            ("year", LogicalType::Int),
            ("value", LogicalType::Decimal),
        ])
        .unwrap()
    }

    fn seed_warehouse(path: &PathBuf, ddl: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(ddl).unwrap();
    }

    #[test]
    fn resolves_bound_relation_and_drops_extra_columns() {
        //* Given a warehouse table with an extra column the schema does not declare
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("warehouse.duckdb");
        seed_warehouse(
            &db,
            "CREATE SCHEMA sources;
             CREATE TABLE sources.wdi (
                 country_id VARCHAR, indicator_id VARCHAR, year INTEGER,
                 value DECIMAL(18,3), loaded_at VARCHAR
             );
             INSERT INTO sources.wdi VALUES
                 ('USA', 'SE.PRM.ENRR', 2020, 12.5, 'ignored'),
                 ('FRA', 'SE.PRM.ENRR', 2021, -3.25, 'ignored');",
        );

        //* When the relation is resolved
        let resolver = Resolver::new(WarehouseLocation::new(Some(db)));
        let identity: TableIdentity = "sources.wdi".parse().unwrap();
        let relation = resolver.resolve(&identity, &wdi_schema()).unwrap();

        //* Then rows are bound, extra columns dropped, order preserved
        assert!(relation.is_bound());
        let batch = relation.record_batch();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 4);
        assert_eq!(batch.schema(), wdi_schema().to_arrow());

        let countries = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(countries.value(0), "USA");

        let years = batch.column(2).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(years.value(1), 2021);

        let values = batch
            .column(3)
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(values.value(0), 12_500);
        assert_eq!(values.value(1), -3_250);
    }

    #[test]
    fn absent_columns_surface_as_typed_nulls() {
        //* Given a backing table missing two declared columns
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("warehouse.duckdb");
        seed_warehouse(
            &db,
            "CREATE SCHEMA sources;
             CREATE TABLE sources.wdi (country_id VARCHAR, indicator_id VARCHAR);
             INSERT INTO sources.wdi VALUES ('USA', 'SE.PRM.ENRR');",
        );

        let resolver = Resolver::new(WarehouseLocation::new(Some(db)));
        let identity: TableIdentity = "sources.wdi".parse().unwrap();
        let relation = resolver.resolve(&identity, &wdi_schema()).unwrap();

        //* Then the declared shape is intact and absent columns are null
        assert!(relation.is_bound());
        let batch = relation.record_batch();
        assert_eq!(batch.schema(), wdi_schema().to_arrow());
        assert_eq!(batch.num_rows(), 1);
        assert!(batch.column(2).is_null(0));
        assert!(batch.column(3).is_null(0));
    }

    #[test]
    fn missing_database_resolves_empty() {
        let resolver = Resolver::new(WarehouseLocation::new(Some(PathBuf::from(
            "/nonexistent/warehouse.duckdb",
        ))));
        let identity: TableIdentity = "sources.wdi".parse().unwrap();
        let relation = resolver.resolve(&identity, &wdi_schema()).unwrap();

        assert!(!relation.is_bound());
        assert_eq!(relation.num_rows(), 0);
        assert_eq!(relation.record_batch().schema(), wdi_schema().to_arrow());
    }

    #[test]
    fn missing_table_resolves_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("warehouse.duckdb");
        seed_warehouse(&db, "CREATE SCHEMA sources;");

        let resolver = Resolver::new(WarehouseLocation::new(Some(db)));
        let identity: TableIdentity = "sources.wdi".parse().unwrap();
        let relation = resolver.resolve(&identity, &wdi_schema()).unwrap();

        assert!(!relation.is_bound());
        assert_eq!(relation.num_rows(), 0);
    }

    #[test]
    fn cast_failure_falls_back_to_empty() {
        //* Given a year column whose contents cannot be cast to INTEGER
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("warehouse.duckdb");
        seed_warehouse(
            &db,
            "CREATE SCHEMA sources;
             CREATE TABLE sources.wdi (
                 country_id VARCHAR, indicator_id VARCHAR, year VARCHAR, value DECIMAL(18,3)
             );
             INSERT INTO sources.wdi VALUES ('USA', 'SE.PRM.ENRR', 'not_a_year', 1.0);",
        );

        let resolver = Resolver::new(WarehouseLocation::new(Some(db)));
        let identity: TableIdentity = "sources.wdi".parse().unwrap();
        let relation = resolver.resolve(&identity, &wdi_schema()).unwrap();

        //* Then the failure is absorbed into a typed empty relation
        assert!(!relation.is_bound());
        assert_eq!(relation.num_rows(), 0);
        assert_eq!(relation.record_batch().schema(), wdi_schema().to_arrow());
    }

    #[test]
    fn parses_decimal_text() {
        assert_eq!(parse_decimal_18_3("12.500"), Some(12_500));
        assert_eq!(parse_decimal_18_3("-3.250"), Some(-3_250));
        assert_eq!(parse_decimal_18_3("0.001"), Some(1));
        assert_eq!(parse_decimal_18_3("42"), Some(42_000));
        assert_eq!(parse_decimal_18_3(".5"), Some(500));
        assert_eq!(parse_decimal_18_3("abc"), None);
        assert_eq!(parse_decimal_18_3(""), None);
        assert_eq!(parse_decimal_18_3("1.2345"), None);
    }
}
