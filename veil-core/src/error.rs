//! Error types for veil-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration; reported once up-front, before any search runs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required precondition on the input data does not hold
    #[error("Precondition error: {0}")]
    Precondition(String),

    /// Malformed generalization hierarchy
    #[error("Hierarchy error: {0}")]
    Hierarchy(String),

    /// Malformed or inconsistent input data
    #[error("Data error: {0}")]
    Data(String),

    /// Serialization or deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }

    /// Create a hierarchy error
    pub fn hierarchy(msg: impl Into<String>) -> Self {
        Error::Hierarchy(msg.into())
    }

    /// Create a data error
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Error::Serialization(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
