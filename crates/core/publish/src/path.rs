use relpub_config::{EnvironmentContext, RuntimeStage};
use relpub_schema::{TableIdentity, TableIdentityError};
use tracing::debug;

/// A fully resolved S3 destination for one relation.
///
/// Keys have the shape
/// `<env-root>/staging/<category>/[<schema>/]<table>.parquet`, where the
/// env root is `dev`, `prod`, or `<target>_<username>` for personal
/// integration environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationTarget {
    bucket: String,
    key: String,
}

impl PublicationTarget {
    /// Resolves the destination for a relation name.
    ///
    /// `name` may be a logical `schema.table` pair or a physical warehouse
    /// name (`schema__table`, optionally carrying a `__<digits>` build
    /// suffix). Returns `Ok(None)` when nothing should be published: during
    /// a dry run, and during the `loading` stage while physical names are
    /// still transient. A name that cannot be reduced to a valid
    /// `schema.table` pair is a hard error, never silently skipped.
    pub fn resolve(
        name: &str,
        ctx: &EnvironmentContext,
    ) -> Result<Option<Self>, PathResolutionError> {
        if ctx.dry_run {
            debug!("dry run, no destination for {name}");
            return Ok(None);
        }
        if ctx.runtime_stage == RuntimeStage::Loading {
            debug!("loading stage, destination for {name} is not stable yet");
            return Ok(None);
        }

        let bucket = ctx
            .bucket
            .as_deref()
            .filter(|bucket| !bucket.is_empty())
            .ok_or(PathResolutionError::MissingBucket)?
            .to_string();

        let identity = parse_relation_name(name)?;
        let key = render_key(&ctx.env_root(), &identity);
        Ok(Some(Self { bucket, key }))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The bucket-relative object key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for PublicationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Reduces a logical or physical relation name to its `schema.table` pair.
fn parse_relation_name(name: &str) -> Result<TableIdentity, PathResolutionError> {
    let trimmed = strip_build_suffix(name);

    let (schema, table) = if trimmed.contains('.') {
        // Dotted form; a catalog prefix is allowed and ignored.
        let segments: Vec<&str> = trimmed.split('.').collect();
        match segments.as_slice() {
            [schema, table] | [_, schema, table] => (*schema, *table),
            _ => {
                return Err(PathResolutionError::Malformed {
                    name: name.to_string(),
                });
            }
        }
    } else if let Some((schema, table)) = trimmed.split_once("__") {
        (schema, table)
    } else {
        return Err(PathResolutionError::Malformed {
            name: name.to_string(),
        });
    };

    TableIdentity::new(None, schema, table).map_err(|source| {
        PathResolutionError::InvalidIdentifier {
            name: name.to_string(),
            source,
        }
    })
}

/// Strips a trailing `__<digits>` build suffix, if present.
fn strip_build_suffix(name: &str) -> &str {
    if let Some((prefix, suffix)) = name.rsplit_once("__")
        && !suffix.is_empty()
        && suffix.chars().all(|c| c.is_ascii_digit())
    {
        return prefix;
    }
    name
}

fn render_key(env_root: &str, identity: &TableIdentity) -> String {
    let table = identity.table();
    match identity.schema() {
        "master" => format!("{env_root}/staging/master/{table}.parquet"),
        "_metadata" => format!("{env_root}/staging/_metadata/{table}.parquet"),
        // The canonical source schema publishes flat under `source/`.
        "sources" => format!("{env_root}/staging/source/{table}.parquet"),
        // Any other schema nests one level below `source/`.
        schema => format!("{env_root}/staging/source/{schema}/{table}.parquet"),
    }
}

/// Error type for destination resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum PathResolutionError {
    /// No bucket is configured for a live destination.
    #[error("S3_BUCKET_NAME is not set, cannot resolve a publication path")]
    MissingBucket,
    /// The relation name cannot be reduced to a `schema.table` pair.
    #[error("cannot derive schema and table from relation name '{name}'")]
    Malformed { name: String },
    /// The reduced pair is not a valid identifier.
    #[error("relation name '{name}' reduces to an invalid identifier")]
    InvalidIdentifier {
        name: String,
        #[source]
        source: TableIdentityError,
    },
}
