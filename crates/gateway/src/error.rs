use skypanel_core::error::CoreError;

/// Errors surfaced by gateway implementations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network-level failure talking to the platform.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The platform rejected the request's credentials/token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A row could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A remote procedure reported a failure of its own.
    #[error("Remote procedure {name} failed: {message}")]
    Procedure { name: &'static str, message: String },

    /// The collection is not known to this gateway (memory double only).
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(msg) => CoreError::Transport(msg),
            GatewayError::Unauthorized(msg) => CoreError::Unauthorized(msg),
            GatewayError::Decode(e) => CoreError::Internal(format!("Row decode failed: {e}")),
            GatewayError::Procedure { name, message } => {
                CoreError::Internal(format!("Procedure {name} failed: {message}"))
            }
            GatewayError::UnknownCollection(name) => {
                CoreError::Internal(format!("Unknown collection: {name}"))
            }
        }
    }
}
