//! Opaque caller identity.

use std::fmt::{self, Debug, Formatter};

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Opaque per-user credential used only to select a storage location.
///
/// The raw token never appears in `Debug` output or logs; use
/// [`UserIdentity::fingerprint`] when a stable, non-secret label is needed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity {
    token: String,
}

impl UserIdentity {
    /// Wraps the supplied token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] when the token is empty or whitespace.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::InvalidIdentity {
                reason: "identity token must not be empty".into(),
            });
        }
        Ok(Self { token })
    }

    /// Returns the raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.token
    }

    /// Returns the lowercase hex SHA-256 digest of the token.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.token.as_bytes()))
    }

    /// Returns the first eight hex characters of the fingerprint, for logs.
    #[must_use]
    pub fn short_fingerprint(&self) -> String {
        let mut fingerprint = self.fingerprint();
        fingerprint.truncate(8);
        fingerprint
    }
}

impl Debug for UserIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("fingerprint", &self.short_fingerprint())
            .finish_non_exhaustive()
    }
}
