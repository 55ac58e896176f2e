//! Local content-addressed object store.
//!
//! Uploaded files are stored flat under the content directory, keyed by the
//! SHA-256 digest of their bytes (original extension preserved) and served
//! read-only under `/files/`. The key doubles as the deletion handle. Writes
//! go through a temp file + rename.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors from the content store.
#[derive(Debug)]
pub enum ContentStoreError {
    /// I/O error reading or writing an object.
    IoError(PathBuf, io::Error),
    /// Key failed validation (e.g. contains path separators).
    InvalidKey(String),
}

impl std::fmt::Display for ContentStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentStoreError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ContentStoreError::InvalidKey(key) => write!(f, "Invalid storage key: {}", key),
        }
    }
}

impl std::error::Error for ContentStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContentStoreError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// A stored object: where to fetch it and the handle to release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub url: String,
    pub storage_key: String,
}

/// File-backed object store with content-derived keys.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    public_url: String,
}

impl ContentStore {
    /// Creates a store rooted at `root`; URLs are built from `public_url`.
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    /// Directory the objects live in (the `/files/` service points here).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates a storage key to prevent path traversal.
    fn validate_key(key: &str) -> Result<(), ContentStoreError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(ContentStoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Derives the storage key for a payload: truncated SHA-256 hex plus the
    /// sanitized original extension.
    fn derive_key(original_name: &str, bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let mut key = hex_prefix(&digest, 16);

        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        if let Some(ext) = ext {
            if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            {
                key.push('.');
                key.push_str(&ext);
            }
        }

        key
    }

    /// Writes the payload and returns its URL and deletion handle.
    ///
    /// Identical payloads map to the same key, so re-storing is a no-op
    /// overwrite of the same object.
    pub fn store(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredContent, ContentStoreError> {
        let key = Self::derive_key(original_name, bytes);
        let path = self.root.join(&key);

        fs::create_dir_all(&self.root)
            .map_err(|e| ContentStoreError::IoError(self.root.clone(), e))?;

        // Write atomically using temp file + rename
        let temp_path = self.root.join(format!("{}.tmp", key));
        fs::write(&temp_path, bytes)
            .map_err(|e| ContentStoreError::IoError(temp_path.clone(), e))?;
        fs::rename(&temp_path, &path).map_err(|e| ContentStoreError::IoError(path.clone(), e))?;

        let url = format!("{}/files/{}", self.public_url.trim_end_matches('/'), key);

        Ok(StoredContent {
            url,
            storage_key: key,
        })
    }

    /// Removes a stored object. Deleting a key that no longer exists is not
    /// an error; release is best-effort by contract.
    pub fn delete(&self, key: &str) -> Result<(), ContentStoreError> {
        Self::validate_key(key)?;

        let path = self.root.join(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ContentStoreError::IoError(path, e)),
        }
    }
}

fn hex_prefix(digest: &[u8], n_bytes: usize) -> String {
    digest
        .iter()
        .take(n_bytes)
        .map(|b| format!("{:02x}", b))
        .collect()
}
