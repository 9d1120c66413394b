//! Error types for the Beacon client library.

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the credential. Modeled as an explicit error the
    /// UI layer reacts to — never an implicit redirect inside the client.
    #[error("credential rejected or expired")]
    AuthExpired,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    #[error("capture error: {0}")]
    Capture(String),
}
