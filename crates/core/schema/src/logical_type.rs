use arrow::datatypes::DataType;
use serde::Deserialize;

/// Precision/scale used for all decimal columns.
///
/// Indicator values are stored with three fractional digits; 18 digits of
/// precision covers every observed magnitude with room to spare.
pub const DECIMAL_PRECISION: u8 = 18;
pub const DECIMAL_SCALE: i8 = 3;

/// The closed set of column types a published relation may carry.
///
/// Each variant maps to exactly one arrow `DataType` and one warehouse SQL
/// type name, so a declared schema renders identically whether it is
/// materialized from warehouse rows or synthesized as an empty relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// UTF-8 text (`VARCHAR`).
    String,
    /// 32-bit integer (`INTEGER`).
    Int,
    /// 64-bit integer (`BIGINT`).
    Int64,
    /// Fixed-point decimal, 18 digits / scale 3 (`DECIMAL(18,3)`).
    Decimal,
    /// 64-bit float (`DOUBLE`).
    Float,
}

impl LogicalType {
    /// The arrow type this logical type materializes as.
    pub fn arrow_data_type(&self) -> DataType {
        match self {
            LogicalType::String => DataType::Utf8,
            LogicalType::Int => DataType::Int32,
            LogicalType::Int64 => DataType::Int64,
            LogicalType::Decimal => DataType::Decimal128(DECIMAL_PRECISION, DECIMAL_SCALE),
            LogicalType::Float => DataType::Float64,
        }
    }

    /// The SQL type name used in `CAST` expressions against the warehouse.
    pub fn sql_type_name(&self) -> &'static str {
        match self {
            LogicalType::String => "VARCHAR",
            LogicalType::Int => "INTEGER",
            LogicalType::Int64 => "BIGINT",
            LogicalType::Decimal => "DECIMAL(18,3)",
            LogicalType::Float => "DOUBLE",
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogicalType::String => "string",
            LogicalType::Int => "int",
            LogicalType::Int64 => "int64",
            LogicalType::Decimal => "decimal",
            LogicalType::Float => "float",
        };
        f.write_str(name)
    }
}
