use std::path::{Path, PathBuf};

use tracing::debug;

/// Well-known places the build drops its warehouse file, tried in order when
/// no explicit path is configured (or the configured one is absent).
const FALLBACK_PATHS: &[&str] = &[
    "warehouse/relpub.duckdb",
    "data/relpub.duckdb",
    "relpub.duckdb",
];

/// Where to find the embedded warehouse file.
///
/// Parsed from a `duckdb://<path>` connection string or built from an
/// optional configured path. Locating the file is separate from constructing
/// the location: the file legitimately may not exist yet, and resolution
/// treats that as an empty warehouse rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseLocation {
    configured: Option<PathBuf>,
}

impl WarehouseLocation {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self { configured }
    }

    /// The first candidate path that exists on disk, if any.
    ///
    /// The configured path wins; otherwise the well-known fallback locations
    /// are probed relative to the working directory.
    pub fn locate(&self) -> Option<PathBuf> {
        let candidates = self
            .configured
            .iter()
            .map(PathBuf::as_path)
            .chain(FALLBACK_PATHS.iter().map(Path::new));

        for candidate in candidates {
            if candidate.is_file() {
                debug!("using warehouse file at {}", candidate.display());
                return Some(candidate.to_path_buf());
            }
        }
        None
    }

    pub fn configured_path(&self) -> Option<&Path> {
        self.configured.as_deref()
    }
}

impl std::str::FromStr for WarehouseLocation {
    /// Accepts a plain filesystem path or a `duckdb://<path>` connection
    /// string. Any other scheme is rejected.
    type Err = WarehouseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = match s.strip_prefix("duckdb://") {
            Some(path) => path,
            None if s.contains("://") => {
                return Err(WarehouseLocationError::UnsupportedScheme {
                    value: s.to_string(),
                });
            }
            None => s,
        };
        if path.is_empty() {
            return Err(WarehouseLocationError::EmptyPath);
        }
        Ok(Self::new(Some(PathBuf::from(path))))
    }
}

/// Error type for [`WarehouseLocation`] parsing failures.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseLocationError {
    /// The connection string carries a scheme other than `duckdb://`.
    #[error("expected a plain path or a 'duckdb://<path>' connection string, got '{value}'")]
    UnsupportedScheme { value: String },
    /// The location has no path component.
    #[error("warehouse location has an empty path")]
    EmptyPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connection_string() {
        let location: WarehouseLocation = "duckdb://warehouse/analytics.duckdb".parse().unwrap();
        assert_eq!(
            location.configured_path(),
            Some(Path::new("warehouse/analytics.duckdb"))
        );
    }

    #[test]
    fn parses_plain_paths() {
        // DB_PATH is commonly a bare filesystem path
        let location: WarehouseLocation = "warehouse/analytics.duckdb".parse().unwrap();
        assert_eq!(
            location.configured_path(),
            Some(Path::new("warehouse/analytics.duckdb"))
        );
    }

    #[test]
    fn rejects_other_schemes_and_empty_paths() {
        assert!(matches!(
            "postgres://host/db".parse::<WarehouseLocation>(),
            Err(WarehouseLocationError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            "duckdb://".parse::<WarehouseLocation>(),
            Err(WarehouseLocationError::EmptyPath)
        ));
        assert!(matches!(
            "".parse::<WarehouseLocation>(),
            Err(WarehouseLocationError::EmptyPath)
        ));
    }

    #[test]
    fn locate_prefers_the_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("analytics.duckdb");
        std::fs::write(&db, b"").unwrap();

        let location = WarehouseLocation::new(Some(db.clone()));
        assert_eq!(location.locate(), Some(db));
    }

    #[test]
    fn locate_returns_none_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let location = WarehouseLocation::new(Some(dir.path().join("missing.duckdb")));
        // Fallback candidates are relative to the working directory and do
        // not exist in the test environment either.
        assert_eq!(location.locate(), None);
    }
}
