//! Error types shared across the connector crates

use thiserror::Error;

/// Errors produced by the resource identity codec
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity string did not split into the expected number of fields.
    /// There is no tolerance for missing or extra fields; a truncated match
    /// would address the wrong remote object.
    #[error("error parsing resource id: unexpected format: {input:?} (expected {expected} fields, found {found})")]
    UnexpectedFormat {
        input: String,
        expected: usize,
        found: usize,
    },
}

/// Errors produced when validating a resolved cluster configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A mandatory field is still empty after resolution
    #[error("{0} is required either in the resource or provider configuration")]
    MissingField(&'static str),
}
