//! Core shared types for the recall long-term memory workspace.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod identity;
mod ids;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Opaque per-user identity token.
pub use identity::UserIdentity;
/// Memory record identifiers and their generator.
pub use ids::{MemoryId, MemoryIdGenerator};
