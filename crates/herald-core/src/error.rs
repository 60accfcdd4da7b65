//! Error types for the herald notification bus.

use thiserror::Error;

/// Result type alias using herald's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for herald operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller supplied a tag or parameter the operation cannot accept
    /// (e.g. binding an interface to a type that is not a notification).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A type name could not be resolved against the type catalog
    #[error("Type resolution failed: {0}")]
    TypeResolution(String),

    /// An asynchronous notification could not be queued for delivery
    #[error("Delivery queueing failed: {0}")]
    DeliveryQueueing(String),

    /// An operation was invoked in a state that does not allow it
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
