use thiserror::Error;

/// Main error type for feedbus
#[derive(Error, Debug)]
pub enum BusError {
    /// Broker-side failure (subscribe, unsubscribe, publish)
    #[error("Broker error: {0}")]
    Broker(String),

    /// Subscription stream ended unexpectedly
    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),

    /// Message parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Handler failed to process a message
    #[error("Handler error: {0}")]
    Handler(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resubscription gave up
    #[error("Resubscription failed after {attempts} attempts: {reason}")]
    ResubscribeFailed { attempts: usize, reason: String },

    /// Invalid binding pattern
    #[error("Invalid binding pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for feedbus operations
pub type Result<T> = std::result::Result<T, BusError>;
