//! Blob storage backends holding one serialized collection per path.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{MemoryError, MemoryResult};

/// Addressable blob store.
///
/// A missing object is not an error: `read` yields `None` and `delete`
/// yields `false`. Any `Err` is a genuine backend failure.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Reads the object at `path`, or `None` if it does not exist.
    async fn read(&self, path: &str) -> MemoryResult<Option<Bytes>>;

    /// Replaces the object at `path` in a single write.
    async fn write(&self, path: &str, bytes: Bytes) -> MemoryResult<()>;

    /// Removes the object at `path`. Returns whether it existed.
    async fn delete(&self, path: &str) -> MemoryResult<bool>;
}

/// Process-local backend keeping blobs in a map.
#[derive(Debug, Default)]
pub struct InMemoryBlobBackend {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryBlobBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Returns `true` when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobBackend for InMemoryBlobBackend {
    async fn read(&self, path: &str) -> MemoryResult<Option<Bytes>> {
        Ok(self.blobs.read().await.get(path).cloned())
    }

    async fn write(&self, path: &str, bytes: Bytes) -> MemoryResult<()> {
        self.blobs.write().await.insert(path.to_owned(), bytes);
        Ok(())
    }

    async fn delete(&self, path: &str) -> MemoryResult<bool> {
        Ok(self.blobs.write().await.remove(path).is_some())
    }
}

/// Backend storing each blob as a file below a root directory.
///
/// Writes go to a temporary sibling file that is renamed into place, so a
/// reader never observes a half-written collection.
#[derive(Debug, Clone)]
pub struct FileBlobBackend {
    root: PathBuf,
}

impl FileBlobBackend {
    /// Creates a backend rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, path: &str) -> MemoryResult<PathBuf> {
        let relative = Path::new(path);
        let mut components = relative.components().peekable();
        if components.peek().is_none() {
            return Err(MemoryError::InvalidConfig("blob path must not be empty"));
        }
        if !components.all(|component| matches!(component, Component::Normal(_))) {
            return Err(MemoryError::InvalidConfig(
                "blob path must be relative and must not contain `.` or `..`",
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobBackend for FileBlobBackend {
    async fn read(&self, path: &str) -> MemoryResult<Option<Bytes>> {
        let location = self.locate(path)?;
        match fs::read(&location).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, path: &str, bytes: Bytes) -> MemoryResult<()> {
        let location = self.locate(path)?;
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut staging = location.clone().into_os_string();
        staging.push(format!(".{}.tmp", Uuid::new_v4()));
        let staging = PathBuf::from(staging);

        let staged = match fs::write(&staging, &bytes).await {
            Ok(()) => fs::rename(&staging, &location).await,
            Err(err) => Err(err),
        };
        if let Err(err) = staged {
            // A partial write may have left the staging file behind.
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> MemoryResult<bool> {
        let location = self.locate(path)?;
        match fs::remove_file(&location).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("recall-blobs-{}", Uuid::new_v4()));
        path
    }

    #[tokio::test]
    async fn in_memory_round_trip() {
        let backend = InMemoryBlobBackend::new();
        assert!(backend.read("a/data.json").await.unwrap().is_none());

        backend
            .write("a/data.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(
            backend.read("a/data.json").await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );
        assert_eq!(backend.len().await, 1);

        assert!(backend.delete("a/data.json").await.unwrap());
        assert!(!backend.delete("a/data.json").await.unwrap());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn file_backend_round_trip() {
        let root = temp_root();
        let backend = FileBlobBackend::new(&root);

        assert!(backend.read("ns/user/data.json").await.unwrap().is_none());
        backend
            .write("ns/user/data.json", Bytes::from_static(b"first"))
            .await
            .unwrap();
        backend
            .write("ns/user/data.json", Bytes::from_static(b"second"))
            .await
            .unwrap();
        assert_eq!(
            backend.read("ns/user/data.json").await.unwrap(),
            Some(Bytes::from_static(b"second"))
        );

        let leftovers = std::fs::read_dir(root.join("ns/user")).unwrap().count();
        assert_eq!(leftovers, 1, "staging files must not linger");

        assert!(backend.delete("ns/user/data.json").await.unwrap());
        assert!(!backend.delete("ns/user/data.json").await.unwrap());
        assert!(backend.read("ns/user/data.json").await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn failed_file_write_leaves_no_staging_file() {
        let root = temp_root();
        let backend = FileBlobBackend::new(&root);
        // A non-empty directory where the blob should go makes the final
        // rename fail after the staging file was written.
        std::fs::create_dir_all(root.join("ns/user/data.json/occupied")).unwrap();

        let err = backend
            .write("ns/user/data.json", Bytes::from_static(b"payload"))
            .await
            .expect_err("target is a directory");
        assert!(matches!(err, MemoryError::Io { .. }));

        let names: Vec<_> = std::fs::read_dir(root.join("ns/user"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("data.json")]);

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn file_backend_rejects_escaping_paths() {
        let backend = FileBlobBackend::new(temp_root());
        for path in ["../outside.json", "/etc/passwd", "a/../../b", ""] {
            let err = backend.read(path).await.expect_err("path should be rejected");
            assert!(matches!(err, MemoryError::InvalidConfig(_)), "{path}");
        }
    }
}
