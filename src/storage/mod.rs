mod gcs;
mod memory;

pub use gcs::GcsObjectStore;
pub use memory::{MemoryObjectStore, StoredObject};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage endpoint returned status {0}")]
    Status(u16),
    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Opaque "put object" capability. The capture path only ever writes whole
/// objects; listing, reads and deletes are someone else's problem.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<(), StorageError>;
}
