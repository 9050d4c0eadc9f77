use async_trait::async_trait;
use tracing::info;

use super::{ObjectStore, StorageError};

/// Object store backed by the GCS JSON API's simple media upload.
pub struct GcsObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl GcsObjectStore {
    pub fn new(endpoint: String, bucket: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint, self.bucket, key
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Status(response.status().as_u16()));
        }

        info!(bucket = %self.bucket, key = %key, "Uploaded object");
        Ok(())
    }
}
