use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::Mutex;
use tracing::info;

/// Path appended to an issuer base URL to reach its verification keys.
pub const KEY_ENDPOINT_PATH: &str = "/oauth2/v2/keys/verificationjwk";

/// Cached key sets are trusted for 60 minutes.
const CACHE_TTL_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum KeyFetchError {
    #[error("key endpoint returned status {0}")]
    Status(u16),
    #[error("key endpoint rate limited and no cached keys available")]
    RateLimited,
    #[error("failed to parse key endpoint response: {0}")]
    Parse(String),
    #[error("key endpoint transport error: {0}")]
    Transport(String),
}

/// A fetch either yields keys or reports that the endpoint is shedding load;
/// the cache decides what a rate limit means (serve stale, or fail).
pub enum KeyFetchOutcome {
    Keys(JwkSet),
    RateLimited,
}

#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<KeyFetchOutcome, KeyFetchError>;
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Fetches verification keys over HTTPS.
pub struct HttpKeyFetcher {
    client: reqwest::Client,
}

impl HttpKeyFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpKeyFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch(&self, url: &str) -> Result<KeyFetchOutcome, KeyFetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let keys = response
                    .json::<JwkSet>()
                    .await
                    .map_err(|e| KeyFetchError::Parse(e.to_string()))?;
                Ok(KeyFetchOutcome::Keys(keys))
            }
            429 => Ok(KeyFetchOutcome::RateLimited),
            status => Err(KeyFetchError::Status(status)),
        }
    }
}

struct CacheEntry {
    keys: JwkSet,
    expires_at: i64,
}

/// Issuer-keyed, TTL-bounded store of verification key sets.
///
/// Clock and fetcher are injected so tests can drive time and the remote
/// endpoint. All read-modify-write sequences run under one mutex held across
/// the fetch, so refreshes are serialized across *all* issuers; sharding the
/// lock per issuer would be a behavior-preserving tuning change.
pub struct KeyCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    fetcher: Arc<dyn KeyFetcher>,
    default_issuer: String,
}

impl KeyCache {
    pub fn new(clock: Arc<dyn Clock>, fetcher: Arc<dyn KeyFetcher>, default_issuer: String) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            fetcher,
            default_issuer,
        }
    }

    /// Return the issuer's current key set, fetching and caching it if the
    /// cached entry is missing or expired. A rate-limited endpoint falls
    /// back to the previous (possibly expired) entry when one exists.
    pub async fn get(&self, issuer: Option<&str>) -> Result<JwkSet, KeyFetchError> {
        let issuer = issuer.unwrap_or(&self.default_issuer).to_string();

        let mut entries = self.entries.lock().await;
        let now = self.clock.now_millis();

        if let Some(entry) = entries.get(&issuer) {
            if now < entry.expires_at {
                return Ok(entry.keys.clone());
            }
        }

        let url = format!("{issuer}{KEY_ENDPOINT_PATH}");
        match self.fetcher.fetch(&url).await? {
            KeyFetchOutcome::Keys(keys) => {
                info!(issuer = %issuer, "Public keys fetched");
                entries.insert(
                    issuer,
                    CacheEntry {
                        keys: keys.clone(),
                        expires_at: now + CACHE_TTL_MS,
                    },
                );
                Ok(keys)
            }
            KeyFetchOutcome::RateLimited => match entries.get(&issuer) {
                Some(entry) => {
                    info!(issuer = %issuer, "Key endpoint rate limited, serving cached keys");
                    Ok(entry.keys.clone())
                }
                None => Err(KeyFetchError::RateLimited),
            },
        }
    }
}
