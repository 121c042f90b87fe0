//! Blob storage abstraction and implementations.
//!
//! Original pages and rendered results are opaque blobs behind a small
//! backend trait:
//!
//! - **Filesystem**: local directory storage (production default)
//! - **Memory**: in-memory storage (tests and dev)

mod backend;
mod filesystem;
mod memory;

pub use backend::{validate_key, StorageBackend};
pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;

use crate::config::StorageConfig;
use crate::Result;
use std::sync::Arc;

/// Storage key for an uploaded original image.
pub fn original_key(upload_id: &str, extension: &str) -> String {
    format!("original/{}{}", upload_id, extension)
}

/// Storage key for a finished translation result.
pub fn result_key(translate_id: &str) -> String {
    format!("result/{}_result.png", translate_id)
}

/// Create a storage backend from configuration.
pub fn create_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::Filesystem { root } => Ok(Arc::new(FilesystemBackend::new(root.clone()))),
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
