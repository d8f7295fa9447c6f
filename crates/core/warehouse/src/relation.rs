use arrow::array::RecordBatch;
use relpub_schema::ColumnSchema;

/// A relation conformed to its declared schema.
///
/// Both variants carry a `RecordBatch` with exactly the declared columns in
/// declared order; `Empty` simply has zero rows. The tag records whether a
/// backing table was found and is intended for logging only. Downstream code
/// must treat both variants identically, which is why the only data accessor
/// is shared.
#[derive(Debug, Clone)]
pub enum ResolvedRelation {
    /// Backed by warehouse rows.
    Bound(RecordBatch),
    /// Synthesized because the warehouse, table, or data was unusable.
    Empty(RecordBatch),
}

impl ResolvedRelation {
    /// A zero-row relation with the declared schema.
    pub fn empty(schema: &ColumnSchema) -> Self {
        ResolvedRelation::Empty(RecordBatch::new_empty(schema.to_arrow()))
    }

    /// The relation's data, identical in shape for both variants.
    pub fn record_batch(&self) -> &RecordBatch {
        match self {
            ResolvedRelation::Bound(batch) | ResolvedRelation::Empty(batch) => batch,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.record_batch().num_rows()
    }

    /// Whether a backing table was found. For logging only.
    pub fn is_bound(&self) -> bool {
        matches!(self, ResolvedRelation::Bound(_))
    }
}

#[cfg(test)]
mod tests {
    use relpub_schema::LogicalType;

    use super::*;

    #[test]
    fn empty_relation_has_declared_shape() {
        let schema = ColumnSchema::new([
            ("indicator_id", LogicalType::String),
            ("value", LogicalType::Decimal),
        ])
        .unwrap();

        let relation = ResolvedRelation::empty(&schema);
        assert!(!relation.is_bound());
        assert_eq!(relation.num_rows(), 0);
        assert_eq!(relation.record_batch().schema(), schema.to_arrow());
    }
}
