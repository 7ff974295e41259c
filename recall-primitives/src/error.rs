//! Shared error definitions for recall primitives.

use std::num::ParseIntError;

use thiserror::Error;

/// Result alias used throughout the recall workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided memory identifier could not be parsed.
    #[error("invalid memory id: {source}")]
    InvalidMemoryId {
        /// Source parsing error.
        #[from]
        source: ParseIntError,
    },

    /// The identity token failed validation.
    #[error("invalid identity: {reason}")]
    InvalidIdentity {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
