//! Mapping from caller identity to storage path.

use async_trait::async_trait;
use recall_primitives::UserIdentity;

use crate::{MemoryError, MemoryResult};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "__long-memories";

/// File name of the per-user collection object.
pub const COLLECTION_FILE: &str = "data.json";

/// Resolves the storage path for a caller. Must be deterministic: the same
/// identity always maps to the same path.
#[async_trait]
pub trait PathResolver: Send + Sync {
    /// Returns the path of the identity's collection object.
    async fn resolve(&self, identity: &UserIdentity) -> MemoryResult<String>;
}

/// Resolves `{namespace}/{sha256(identity)}/data.json`, keeping raw tokens out
/// of storage paths.
#[derive(Debug, Clone)]
pub struct NamespacedPathResolver {
    namespace: String,
}

impl NamespacedPathResolver {
    /// Creates a resolver for the given namespace.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] when the namespace is blank or
    /// contains path separators or dot segments.
    pub fn new(namespace: impl Into<String>) -> MemoryResult<Self> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(MemoryError::InvalidConfig(
                "storage namespace must not be empty",
            ));
        }
        if namespace.contains(['/', '\\']) || namespace == "." || namespace == ".." {
            return Err(MemoryError::InvalidConfig(
                "storage namespace must be a single path segment",
            ));
        }
        Ok(Self { namespace })
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Default for NamespacedPathResolver {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

#[async_trait]
impl PathResolver for NamespacedPathResolver {
    async fn resolve(&self, identity: &UserIdentity) -> MemoryResult<String> {
        Ok(format!(
            "{}/{}/{COLLECTION_FILE}",
            self.namespace,
            identity.fingerprint()
        ))
    }
}
