use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy shared by every provider path. All variants are fatal to
/// the invocation that raised them; nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not set, or isn't valid")]
    Auth,

    #[error("API quota exceeded, please check your provider account")]
    Quota,

    #[error("API service overloaded, please try again later")]
    Overloaded,

    #[error("API error: {0}")]
    Provider(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    /// The agent loop hit the turn ceiling on the primary-provider path.
    #[error("maximum tool execution depth reached ({0} turns), stopping to avoid an infinite loop")]
    DepthExceeded(u32),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify a non-2xx provider response by HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            403 => Error::Auth,
            429 => Error::Quota,
            503 => Error::Overloaded,
            _ => Error::Provider(message.into()),
        }
    }
}
