//! Error types for the Beacon core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering validation, authentication, persistence, notification, and
//! upload domains.

/// Top-level error type for the Beacon core library.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Request input rejected before any persistence happened.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
}

impl ValidationError {
    /// The offending field, for field-level error payloads.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field }
            | ValidationError::NotFinite { field }
            | ValidationError::OutOfRange { field, .. } => field,
        }
    }
}

/// Credential failures, rejected uniformly at the REST and socket boundaries.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    Missing,

    #[error("invalid credential")]
    Invalid,

    #[error("credential expired")]
    Expired,

    #[error("role '{role}' is not permitted to {action}")]
    Forbidden { role: String, action: &'static str },
}

/// Errors from the SQLite store of record.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("dispatch id already exists: {0}")]
    DuplicateDispatchId(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Fan-out failures. Contained and logged, never surfaced to the creator.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("responder lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

/// Audio upload failures, surfaced only to the uploader.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("empty audio clip")]
    EmptyClip,

    #[error("failed to store clip: {0}")]
    Write(String),
}

/// Errors from the configuration loader.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration parse error: {0}")]
    Parse(String),
}

/// A type alias for results using the top-level `BeaconError`.
pub type Result<T> = std::result::Result<T, BeaconError>;
