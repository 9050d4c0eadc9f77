use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    /// PEM certificate chain path. TLS is enabled only when both this and
    /// `tls_key_path` are set.
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Destination bucket. When absent the capture path is disabled and new
    /// streaming calls are rejected at call-open.
    pub bucket: Option<String>,
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Issuers whose tokens are accepted at all.
    #[serde(default = "default_trusted_issuers")]
    pub trusted_issuers: Vec<String>,
    /// Key endpoint base used when a token carries no issuer claim.
    #[serde(default = "default_issuer")]
    pub default_issuer: String,
    /// Expected value of the token's datasource URL claim.
    #[serde(default = "default_datasource_url")]
    pub datasource_url: String,
    /// Expected value of the token's datasource schema claim.
    #[serde(default = "default_datasource_schema")]
    pub datasource_schema_uuid: String,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8086
}

fn default_health_port() -> u16 {
    8080
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_issuer() -> String {
    "https://idbroker.example.com/idb".to_string()
}

fn default_trusted_issuers() -> Vec<String> {
    vec![
        "https://idbroker.example.com/idb".to_string(),
        "https://idbroker-eu.example.com/idb".to_string(),
    ]
}

fn default_datasource_url() -> String {
    "https://audiofork.example.com:443".to_string()
}

fn default_datasource_schema() -> String {
    "523e1b7f-4693-47bc-b84e-a7b7a505fb0b".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            health_port: default_health_port(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            trusted_issuers: default_trusted_issuers(),
            default_issuer: default_issuer(),
            datasource_url: default_datasource_url(),
            datasource_schema_uuid: default_datasource_schema(),
        }
    }
}

impl Config {
    /// Load configuration from a file, then let environment variables
    /// override it (`AUDIOFORK_STORAGE__BUCKET`, `AUDIOFORK_SERVER__PORT`, ...).
    /// The file is optional; every field has a default or is optional itself.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("AUDIOFORK").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
