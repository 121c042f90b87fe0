//! Storage backend trait definition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;
use crate::Result;

/// Trait for blob storage backends.
///
/// Keys are relative, `/`-separated paths (`original/upload_a1b2c3d4.png`).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to a key, replacing any existing object
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read data from a key
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete a key
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Reject keys that could escape the backend's namespace.
///
/// Keys come from request paths (the `/static/` route) as well as from our
/// own id-derived names, so the check runs in every backend.
pub fn validate_key(key: &str) -> Result<()> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()).into());
    }
    Ok(())
}
