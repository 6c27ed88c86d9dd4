//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
///
/// API failures the callers react to (absence, duplicates, optimistic
/// concurrency, immutable fields) get their own variants; everything else
/// stays wrapped in [`ClusterError::Kube`].
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Object does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object already exists (HTTP 409, reason AlreadyExists)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Object changed since it was read (HTTP 409, reason Conflict)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request rejected by validation, e.g. an immutable field changed (HTTP 422)
    #[error("Invalid: {0}")]
    Invalid(String),

    /// Server-side failure reported without a Kubernetes status
    #[error("API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(kube::Error),
}

impl ClusterError {
    /// True for [`ClusterError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    /// True for [`ClusterError::AlreadyExists`]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists(_))
    }

    /// True for [`ClusterError::Conflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }

    /// True for [`ClusterError::Invalid`]
    pub fn is_invalid(&self) -> bool {
        matches!(self, ClusterError::Invalid(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(error: kube::Error) -> Self {
        let classified = match &error {
            kube::Error::Api(status) => classify(status.code, &status.reason, &status.message),
            _ => None,
        };
        match classified {
            Some(classified) => classified,
            None => ClusterError::Kube(error),
        }
    }
}

fn classify(code: u16, reason: &str, message: &str) -> Option<ClusterError> {
    let message = message.to_string();
    match code {
        404 => Some(ClusterError::NotFound(message)),
        409 if reason == "AlreadyExists" => Some(ClusterError::AlreadyExists(message)),
        409 => Some(ClusterError::Conflict(message)),
        422 => Some(ClusterError::Invalid(message)),
        _ => None,
    }
}

/// Maps a not-found result to `Ok(None)`, leaving every other error in place
pub fn ignore_not_found<T>(result: Result<T, ClusterError>) -> Result<Option<T>, ClusterError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ClusterError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
