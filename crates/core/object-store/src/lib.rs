//! Object store sessions and credential brokering.
//!
//! A [`Session`] holds a ready-to-use object store for one build step:
//! either a live S3 store built from validated AWS credentials, or an
//! in-memory mock that records writes without any network traffic.
//! Credentials are acquired fresh per step and never persisted.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::error::DisplayErrorContext;
use object_store::{
    ObjectStore,
    aws::{AmazonS3Builder, AwsCredential},
    memory::InMemory,
};
use relpub_config::EnvironmentContext;
use tracing::{debug, info};

mod error;

pub use error::CredentialError;

use error::{classify_message, classify_store_error};

/// Session name attached to assumed-role credentials, visible in CloudTrail.
const ROLE_SESSION_NAME: &str = "relpub-publish";

/// How the live session's credentials were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialProvenance {
    /// Static keys from the environment.
    Static,
    /// Time-boxed keys from an STS AssumeRole call.
    AssumedRole,
}

/// A storage session for one build step.
///
/// The two variants are deliberately a tagged union rather than a trait
/// object: callers that need to know they are talking to the mock (tests,
/// intent logging) can ask, while everything else goes through
/// [`Session::object_store`] and cannot tell the difference.
#[derive(Debug, Clone)]
pub enum Session {
    /// In-memory store with canned credentials; writes are recorded, not
    /// uploaded.
    Mock {
        store: Arc<InMemory>,
        credentials: Arc<AwsCredential>,
    },
    /// S3-backed store with validated credentials.
    Live {
        store: Arc<dyn ObjectStore>,
        credentials: Arc<AwsCredential>,
        provenance: CredentialProvenance,
    },
}

impl Session {
    /// A fresh mock session. No network traffic will ever leave it.
    pub fn mock() -> Self {
        Session::Mock {
            store: Arc::new(InMemory::new()),
            credentials: Arc::new(AwsCredential {
                key_id: "mock-access-key".to_string(),
                secret_key: "mock-secret-key".to_string(),
                token: None,
            }),
        }
    }

    /// The store to read and write through, regardless of variant.
    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        match self {
            Session::Mock { store, .. } => store.clone(),
            Session::Live { store, .. } => store.clone(),
        }
    }

    /// The frozen credentials backing this session.
    pub fn credentials(&self) -> &AwsCredential {
        match self {
            Session::Mock { credentials, .. } | Session::Live { credentials, .. } => credentials,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Session::Mock { .. })
    }
}

/// Acquires a storage session for the given environment.
///
/// Selection order: the mock flag wins outright; otherwise a configured role
/// ARN is assumed via STS; otherwise static keys are used directly. Live
/// sessions are validated with one cheap read-only list call before being
/// returned, so credential problems surface here with remediation guidance
/// instead of failing mid-upload.
///
/// Failures are not retried at this layer.
pub async fn acquire(ctx: &EnvironmentContext) -> Result<Session, CredentialError> {
    if ctx.mock_storage {
        info!("mock storage enabled, uploads will be recorded in memory only");
        return Ok(Session::mock());
    }

    let bucket = ctx
        .bucket
        .as_deref()
        .filter(|bucket| !bucket.is_empty())
        .ok_or(CredentialError::Misconfigured {
            reason: "S3_BUCKET_NAME is not set",
        })?;

    let (credentials, provenance) = match &ctx.aws.role_arn {
        Some(role_arn) => {
            let credentials = assume_role(role_arn, &ctx.aws.region).await?;
            (credentials, CredentialProvenance::AssumedRole)
        }
        None => (static_credentials(ctx)?, CredentialProvenance::Static),
    };

    let store = build_store(bucket, &ctx.aws.region, &credentials)?;
    validate(store.as_ref(), bucket).await?;

    debug!("storage session ready for bucket {bucket} ({provenance:?})");
    Ok(Session::Live {
        store,
        credentials,
        provenance,
    })
}

/// Obtains time-boxed credentials by assuming the configured role.
async fn assume_role(role_arn: &str, region: &str) -> Result<Arc<AwsCredential>, CredentialError> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;
    let sts = aws_sdk_sts::Client::new(&sdk_config);

    let response = sts
        .assume_role()
        .role_arn(role_arn)
        .role_session_name(ROLE_SESSION_NAME)
        .send()
        .await
        .map_err(|err| {
            classify_message(format!("sts assume-role failed: {}", DisplayErrorContext(&err)))
        })?;

    let credentials = response
        .credentials()
        .ok_or_else(|| CredentialError::Unknown {
            message: "sts assume-role returned no credentials".to_string(),
        })?;

    info!("assumed role {role_arn} as {ROLE_SESSION_NAME}");
    Ok(Arc::new(AwsCredential {
        key_id: credentials.access_key_id().to_string(),
        secret_key: credentials.secret_access_key().to_string(),
        token: Some(credentials.session_token().to_string()),
    }))
}

/// Freezes the static keys from the environment into a credential.
fn static_credentials(ctx: &EnvironmentContext) -> Result<Arc<AwsCredential>, CredentialError> {
    let (Some(key_id), Some(secret_key)) = (
        ctx.aws.access_key_id.as_ref(),
        ctx.aws.secret_access_key.as_ref(),
    ) else {
        return Err(CredentialError::Misconfigured {
            reason: "set AWS_ROLE_ARN or both AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
        });
    };

    Ok(Arc::new(AwsCredential {
        key_id: key_id.as_ref().clone(),
        secret_key: secret_key.as_ref().clone(),
        token: ctx
            .aws
            .session_token
            .as_ref()
            .map(|token| token.as_ref().clone()),
    }))
}

fn build_store(
    bucket: &str,
    region: &str,
    credentials: &AwsCredential,
) -> Result<Arc<dyn ObjectStore>, CredentialError> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(region)
        .with_access_key_id(&credentials.key_id)
        .with_secret_access_key(&credentials.secret_key);
    if let Some(token) = &credentials.token {
        builder = builder.with_token(token);
    }

    let store = builder
        .build()
        .map_err(|err| classify_store_error("failed to build S3 store", err))?;
    Ok(Arc::new(store))
}

/// One cheap read-only probe against the bucket root. Surfaces expired or
/// otherwise broken credentials before any data is written.
async fn validate(store: &dyn ObjectStore, bucket: &str) -> Result<(), CredentialError> {
    store
        .list_with_delimiter(None)
        .await
        .map_err(|err| classify_store_error("bucket validation list failed", err))?;
    debug!("validated access to bucket {bucket}");
    Ok(())
}
