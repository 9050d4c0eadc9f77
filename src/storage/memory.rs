use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ObjectStore, StorageError};

/// In-memory object store for tests and local runs.
///
/// Optionally fails puts for specific keys so callers can exercise
/// partial-failure handling.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_keys: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future put of `key` fail with a transport error.
    pub fn fail_key(&self, key: &str) {
        self.fail_keys.lock().unwrap().push(key.to_string());
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<(), StorageError> {
        if self.fail_keys.lock().unwrap().iter().any(|k| k == key) {
            return Err(StorageError::Transport(format!("injected failure for {key}")));
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                data,
            },
        );
        Ok(())
    }
}
