//! Error types for the Grouper overlay

use thiserror::Error;

/// Top-level error type for core operations
#[derive(Debug, Error)]
pub enum GrouperError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Interval error: {0}")]
    Interval(#[from] IntervalError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors related to peer identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid identity length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Errors raised when building interval values outside the attribute domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("Range start {start} outside domain [0, {max})")]
    StartOutOfDomain { start: u8, max: u8 },

    #[error("Range end {end} outside domain (0, {max}]")]
    EndOutOfDomain { end: u8, max: u8 },

    #[error("Empty range: start {start} is not below end {end}")]
    EmptyRange { start: u8, end: u8 },

    #[error("Event value {value} outside domain [0, {max}]")]
    ValueOutOfDomain { value: u8, max: u8 },
}

/// Errors from encoding or decoding application payloads
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Result type alias for core operations
pub type GrouperResult<T> = Result<T, GrouperError>;
