//! Environment-derived runtime configuration.
//!
//! All deployment knobs arrive through environment variables. They are read
//! once at process start into an [`EnvironmentContext`], which is then passed
//! by reference into every component; nothing reads the environment after
//! startup.

use std::path::PathBuf;

use figment::{Figment, providers::Env};
use serde::Deserialize;
use thiserror::Error;

mod redacted;

pub use redacted::Redacted;

/// Environment variables recognized at startup. Anything else is ignored.
const RECOGNIZED_VARS: &[&str] = &[
    "S3_BUCKET_NAME",
    "TARGET",
    "USERNAME",
    "RUNTIME_STAGE",
    "DRY_RUN_FLG",
    "ENABLE_S3_UPLOAD",
    "RELPUB_MOCK_STORAGE",
    "DB_PATH",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_ROLE_ARN",
    "AWS_DEFAULT_REGION",
];

/// Deployment target the build is publishing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Dev,
    Int,
    Qa,
    Prod,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Dev => "dev",
            Target::Int => "int",
            Target::Qa => "qa",
            Target::Prod => "prod",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Target::Dev),
            "int" => Ok(Target::Int),
            "qa" => Ok(Target::Qa),
            "prod" => Ok(Target::Prod),
            _ => Err(ConfigError::InvalidTarget {
                value: s.to_string(),
            }),
        }
    }
}

/// Phase of the build the process is running in.
///
/// During `loading`, physical table names are still carrying transient build
/// suffixes, so nothing may be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStage {
    Loading,
    Running,
}

impl std::str::FromStr for RuntimeStage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "loading" => Ok(RuntimeStage::Loading),
            "running" => Ok(RuntimeStage::Running),
            _ => Err(ConfigError::InvalidStage {
                value: s.to_string(),
            }),
        }
    }
}

/// AWS-specific settings. Key material is held redacted and never serialized.
#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub region: String,
    /// When set, credentials are obtained by assuming this role instead of
    /// using the static keys directly.
    pub role_arn: Option<String>,
    pub access_key_id: Option<Redacted<String>>,
    pub secret_access_key: Option<Redacted<String>>,
    pub session_token: Option<Redacted<String>>,
}

/// Immutable snapshot of the deployment environment, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    pub target: Target,
    /// Lowercased; used in the per-developer S3 environment root.
    pub username: String,
    pub bucket: Option<String>,
    pub runtime_stage: RuntimeStage,
    /// When set, path resolution yields no destination and nothing is written.
    pub dry_run: bool,
    /// When cleared, the publish step logs and skips instead of uploading.
    pub upload_enabled: bool,
    /// Routes all object store traffic to an in-memory mock.
    pub mock_storage: bool,
    pub db_path: Option<PathBuf>,
    pub aws: AwsSettings,
}

/// Raw environment shape as figment extracts it; everything optional,
/// everything a string. Typed parsing happens in [`EnvironmentContext::from_env`].
#[derive(Debug, Deserialize)]
struct RawEnv {
    s3_bucket_name: Option<String>,
    target: Option<String>,
    username: Option<String>,
    runtime_stage: Option<String>,
    dry_run_flg: Option<String>,
    enable_s3_upload: Option<String>,
    relpub_mock_storage: Option<String>,
    db_path: Option<PathBuf>,
    aws_access_key_id: Option<Redacted<String>>,
    aws_secret_access_key: Option<Redacted<String>>,
    aws_session_token: Option<Redacted<String>>,
    aws_role_arn: Option<String>,
    aws_default_region: Option<String>,
}

impl EnvironmentContext {
    /// Reads the recognized environment variables into a typed context.
    ///
    /// Parsing is strict (a malformed target, stage, or flag is an error) but
    /// presence is not: missing variables fall back to the dev defaults.
    /// Completeness checks live in [`EnvironmentContext::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: RawEnv = Figment::new()
            .merge(Env::raw().only(RECOGNIZED_VARS))
            .extract()
            .map_err(ConfigError::Figment)?;

        let target = match raw.target.as_deref() {
            Some(value) => value.parse()?,
            None => Target::Dev,
        };
        let runtime_stage = match raw.runtime_stage.as_deref() {
            Some(value) => value.parse()?,
            None => RuntimeStage::Running,
        };

        Ok(Self {
            target,
            username: raw
                .username
                .unwrap_or_else(|| "default".to_string())
                .to_lowercase(),
            bucket: raw.s3_bucket_name,
            runtime_stage,
            dry_run: parse_flag("DRY_RUN_FLG", raw.dry_run_flg.as_deref(), false)?,
            upload_enabled: parse_flag("ENABLE_S3_UPLOAD", raw.enable_s3_upload.as_deref(), true)?,
            mock_storage: parse_flag(
                "RELPUB_MOCK_STORAGE",
                raw.relpub_mock_storage.as_deref(),
                false,
            )?,
            db_path: raw.db_path,
            aws: AwsSettings {
                region: raw
                    .aws_default_region
                    .unwrap_or_else(|| "us-east-1".to_string()),
                role_arn: raw.aws_role_arn,
                access_key_id: raw.aws_access_key_id,
                secret_access_key: raw.aws_secret_access_key,
                session_token: raw.aws_session_token,
            },
        })
    }

    /// The environment root under the bucket: `dev`, `prod`, or
    /// `<target>_<username>` for personal integration environments.
    pub fn env_root(&self) -> String {
        match self.target {
            Target::Dev => "dev".to_string(),
            Target::Prod => "prod".to_string(),
            target => format!("{target}_{}", self.username),
        }
    }

    /// Checks that the context is complete enough to publish.
    ///
    /// The binary calls this before any build work and exits non-zero on
    /// failure. A mock-storage context needs no bucket and no credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mock_storage {
            return Ok(());
        }

        if self.upload_enabled && !self.dry_run {
            if self.bucket.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingVar {
                    name: "S3_BUCKET_NAME",
                });
            }

            // Role assumption sources keys from the ambient AWS config;
            // without a role, static keys must be present.
            if self.aws.role_arn.is_none()
                && (self.aws.access_key_id.is_none() || self.aws.secret_access_key.is_none())
            {
                return Err(ConfigError::MissingCredentials);
            }
        }

        if matches!(self.target, Target::Int | Target::Qa) && self.username.is_empty() {
            return Err(ConfigError::MissingVar { name: "USERNAME" });
        }

        Ok(())
    }
}

/// Parses a boolean flag variable. Accepts `true`/`false`, `1`/`0`,
/// `yes`/`no` in any case; anything else is a hard error rather than a
/// silently-disabled flag.
fn parse_flag(name: &'static str, value: Option<&str>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

/// Error type for environment loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Figment(#[source] figment::Error),
    #[error("unknown deployment target '{value}' (expected dev, int, qa, or prod)")]
    InvalidTarget { value: String },
    #[error("unknown runtime stage '{value}' (expected loading or running)")]
    InvalidStage { value: String },
    #[error("flag {name} must be true/false, 1/0, or yes/no, got '{value}'")]
    InvalidFlag {
        name: &'static str,
        value: String,
    },
    #[error("required environment variable {name} is not set")]
    MissingVar { name: &'static str },
    #[error(
        "no AWS credentials configured: set AWS_ROLE_ARN or both AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY"
    )]
    MissingCredentials,
}
