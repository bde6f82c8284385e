//! Error types for the model bridge.
//!
//! Every failure that can reach a caller is classified by [`ErrorKind`] and
//! carried as a [`BridgeError`]. Lower layers have their own error types
//! ([`StagingError`], [`EngineError`], [`ConfigError`]) which are converted at
//! the lifecycle boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Classification of a failed bridge operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Packaged model payload is absent from the bundle.
    AssetMissing,
    /// Staging copy failed (I/O, space, permissions).
    StorageError,
    /// The engine rejected the weights or ran out of resources.
    LoadError,
    /// A single generation call failed.
    GenerationError,
    /// Operation attempted while the model is being prepared.
    NotReady,
    /// Operation needs a loaded model and none is loaded.
    ModelNotLoaded,
    /// Releasing the engine handle failed.
    UnloadError,
    /// Request was rejected before submission (e.g. empty prompt).
    InvalidInput,
    /// The lifecycle worker is gone or did not reply.
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AssetMissing => "ASSET_MISSING",
            ErrorKind::StorageError => "STORAGE_ERROR",
            ErrorKind::LoadError => "LOAD_ERROR",
            ErrorKind::GenerationError => "GENERATION_ERROR",
            ErrorKind::NotReady => "NOT_READY",
            ErrorKind::ModelNotLoaded => "MODEL_NOT_LOADED",
            ErrorKind::UnloadError => "UNLOAD_ERROR",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `{kind, message}` failure payload returned by every bridge call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_ready() -> Self {
        Self::new(
            ErrorKind::NotReady,
            "Model is still being prepared; try again shortly",
        )
    }

    pub fn model_not_loaded() -> Self {
        Self::new(ErrorKind::ModelNotLoaded, "Model is not loaded")
    }

    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidInput, msg)
    }

    /// Check if the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::StorageError
                | ErrorKind::LoadError
                | ErrorKind::GenerationError
                | ErrorKind::NotReady
                | ErrorKind::Unavailable
        )
    }
}

/// Failures while materializing a bundled asset in writable storage.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("asset '{name}' is not present in the application bundle; reinstall the application")]
    AssetMissing { name: String },

    #[error("failed to stage asset to {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StagingError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

impl From<StagingError> for BridgeError {
    fn from(err: StagingError) -> Self {
        let kind = match err {
            StagingError::AssetMissing { .. } => ErrorKind::AssetMissing,
            StagingError::Storage { .. } => ErrorKind::StorageError,
        };
        BridgeError::new(kind, err.to_string())
    }
}

/// Failures reported by an inference engine implementation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("model load failed: {0}")]
    Load(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("release failed: {0}")]
    Release(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_as_code() {
        let err = BridgeError::new(ErrorKind::ModelNotLoaded, "Model is not loaded");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "MODEL_NOT_LOADED");
        assert_eq!(json["message"], "Model is not loaded");
    }

    #[test]
    fn test_is_retryable() {
        assert!(BridgeError::not_ready().is_retryable());
        assert!(BridgeError::new(ErrorKind::LoadError, "oom").is_retryable());
        assert!(BridgeError::unavailable("gone").is_retryable());

        assert!(!BridgeError::model_not_loaded().is_retryable());
        assert!(!BridgeError::new(ErrorKind::AssetMissing, "x").is_retryable());
        assert!(!BridgeError::invalid_input("empty").is_retryable());
    }

    #[test]
    fn test_staging_error_classification() {
        let missing: BridgeError = StagingError::AssetMissing {
            name: "model.task".into(),
        }
        .into();
        assert_eq!(missing.kind, ErrorKind::AssetMissing);
        assert!(missing.message.contains("reinstall"));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let storage: BridgeError = StagingError::storage("/tmp/model.task", io).into();
        assert_eq!(storage.kind, ErrorKind::StorageError);
        assert!(storage.message.contains("disk full"));
    }
}
