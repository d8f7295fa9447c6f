/// Error type for credential acquisition and validation failures.
///
/// Known AWS failure codes are mapped to dedicated variants whose messages
/// carry operator remediation steps; everything else collapses into
/// [`CredentialError::Unknown`]. None of these are retried: a bad credential
/// does not get better by asking again.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The session token or temporary credentials have expired.
    #[error(
        "AWS credentials have expired ({message}); \
         re-authenticate (e.g. `aws sso login`) or export fresh AWS_* variables"
    )]
    Expired { message: String },

    /// The access key id is not known to AWS.
    #[error(
        "AWS access key is not recognized ({message}); \
         check AWS_ACCESS_KEY_ID for typos or a deactivated key"
    )]
    InvalidKey { message: String },

    /// The secret key does not match the access key.
    #[error(
        "request signature mismatch ({message}); \
         the secret does not match the access key, re-copy AWS_SECRET_ACCESS_KEY"
    )]
    SignatureMismatch { message: String },

    /// The credentials are valid but lack access to the bucket.
    #[error(
        "access denied ({message}); \
         verify the IAM policy grants s3:ListBucket and s3:PutObject on the bucket"
    )]
    MissingPermission { message: String },

    /// Required settings for a live session are absent.
    #[error("cannot build a storage session: {reason}")]
    Misconfigured { reason: &'static str },

    /// Anything not covered by a known failure code.
    #[error("credential acquisition failed: {message}")]
    Unknown { message: String },
}

/// Maps an AWS failure message to a [`CredentialError`] by its embedded
/// error code. Codes follow the S3/STS wire names.
pub(crate) fn classify_message(message: String) -> CredentialError {
    let lower = message.to_lowercase();
    if lower.contains("expiredtoken") || lower.contains("token has expired") {
        CredentialError::Expired { message }
    } else if lower.contains("invalidaccesskeyid") || lower.contains("invalidclienttokenid") {
        CredentialError::InvalidKey { message }
    } else if lower.contains("signaturedoesnotmatch") {
        CredentialError::SignatureMismatch { message }
    } else if lower.contains("accessdenied")
        || lower.contains("access denied")
        || lower.contains("forbidden")
    {
        CredentialError::MissingPermission { message }
    } else {
        CredentialError::Unknown { message }
    }
}

/// Classifies an `object_store` failure, folding the typed variants in with
/// the message-code mapping.
pub(crate) fn classify_store_error(context: &str, err: object_store::Error) -> CredentialError {
    match &err {
        object_store::Error::PermissionDenied { .. } => CredentialError::MissingPermission {
            message: format!("{context}: {err}"),
        },
        _ => classify_message(format!("{context}: {err}")),
    }
}
