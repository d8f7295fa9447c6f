use object_store::{buffered::BufWriter, path::Path};
use parquet::{arrow::AsyncArrowWriter, errors::ParquetError};
use relpub_object_store::Session;
use relpub_warehouse::ResolvedRelation;
use tracing::info;

use crate::PublicationTarget;

/// Writes the relation to its destination as a single parquet object.
///
/// The write streams through a buffered object store writer; the key is
/// overwritten in place. Bound and empty relations publish identically, so a
/// missing upstream table still yields a well-formed zero-row file.
///
/// Errors carry the offending destination and are safe to retry at the call
/// site.
pub async fn publish(
    relation: &ResolvedRelation,
    target: &PublicationTarget,
    session: &Session,
) -> Result<(), PublicationError> {
    if session.is_mock() {
        info!("mock storage: recording {target} in memory");
    }

    let batch = relation.record_batch();
    let path = Path::from(target.key());
    let store_writer = BufWriter::new(session.object_store(), path);

    let mut writer = AsyncArrowWriter::try_new(store_writer, batch.schema(), None)
        .map_err(|source| PublicationError::Parquet {
            target: target.to_string(),
            source,
        })?;
    writer
        .write(batch)
        .await
        .map_err(|source| PublicationError::Parquet {
            target: target.to_string(),
            source,
        })?;
    writer
        .close()
        .await
        .map_err(|source| PublicationError::Parquet {
            target: target.to_string(),
            source,
        })?;

    info!(
        "published {} rows to {target} ({})",
        batch.num_rows(),
        if relation.is_bound() { "bound" } else { "empty" },
    );
    Ok(())
}

/// Error type for publication failures.
#[derive(Debug, thiserror::Error)]
pub enum PublicationError {
    /// The parquet write failed. Wraps both encoding and upload errors.
    #[error("failed to publish parquet to {target}: {source}")]
    Parquet {
        target: String,
        #[source]
        source: ParquetError,
    },
}

impl PublicationError {
    /// The destination the failure occurred at.
    pub fn target(&self) -> &str {
        match self {
            PublicationError::Parquet { target, .. } => target,
        }
    }
}
