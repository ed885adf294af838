//! Error types for the api crate.

use thiserror::Error;

/// A result type using `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors raised while interpreting build inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// A required name was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A name had no characters that survive normalization.
    #[error("name {0:?} contains no characters usable in an object name")]
    InvalidName(String),

    /// A strategy string did not match any known variant.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
}
