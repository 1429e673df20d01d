use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed pool data: got {len} bytes, need at least {min}")]
    MalformedData { len: usize, min: usize },

    #[error("Invalid rate for {from}->{to}: {reason}")]
    InvalidRate {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Subscription failure: {0}")]
    Subscription(String),

    #[error("Startup failure: {0}")]
    Startup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl AppError {
    /// Decode and rate errors only cost one update; everything else ends the task.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedData { .. } | Self::InvalidRate { .. })
    }
}
