use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{error, info, warn};

use crate::auth::{AuthLayer, HttpKeyFetcher, KeyCache, SystemClock, TokenValidator};
use crate::capture::ConversationAudioService;
use crate::config::Config;
use crate::health::HealthService;
use crate::pb::conversation_audio_server::ConversationAudioServer;
use crate::pb::health_server::HealthServer;
use crate::storage::{GcsObjectStore, ObjectStore};

/// Run both servers until shutdown:
/// a plaintext health server, and the TLS-capable main server whose services
/// sit behind the authorization layer.
pub async fn run(config: Config) -> Result<()> {
    let serving = Arc::new(AtomicBool::new(false));

    let health_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.health_port)
        .parse()
        .context("invalid health listen address")?;
    let health = HealthService::new(Arc::clone(&serving));
    tokio::spawn(async move {
        if let Err(e) = Server::builder()
            .add_service(HealthServer::new(health))
            .serve(health_addr)
            .await
        {
            error!("Health server terminated: {e}");
        }
    });
    info!("Health server listening on {health_addr} (plaintext, no authorization)");

    let clock = Arc::new(SystemClock);
    let fetcher = Arc::new(HttpKeyFetcher::new());
    let key_cache = Arc::new(KeyCache::new(
        clock.clone(),
        fetcher,
        config.auth.default_issuer.clone(),
    ));
    let validator = Arc::new(TokenValidator::new(key_cache, clock, &config.auth));

    let store: Option<Arc<dyn ObjectStore>> = config.storage.bucket.clone().map(|bucket| {
        info!(bucket = %bucket, "Object storage configured");
        Arc::new(GcsObjectStore::new(config.storage.endpoint.clone(), bucket))
            as Arc<dyn ObjectStore>
    });
    let capture = ConversationAudioService::new(store);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid listen address")?;

    let mut builder = Server::builder();
    match (&config.server.tls_cert_path, &config.server.tls_key_path) {
        (Some(cert_path), Some(key_path)) => {
            let cert = tokio::fs::read(cert_path)
                .await
                .with_context(|| format!("failed to read TLS certificate {cert_path}"))?;
            let key = tokio::fs::read(key_path)
                .await
                .with_context(|| format!("failed to read TLS private key {key_path}"))?;
            builder = builder
                .tls_config(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
                .context("invalid TLS configuration")?;
            info!("TLS enabled for main server");
        }
        _ => {
            warn!("TLS is not configured; the main server will run unencrypted");
            warn!("Set server.tls_cert_path and server.tls_key_path outside local development");
        }
    }

    serving.store(true, Ordering::SeqCst);
    info!("Main server listening on {addr}");

    let shutdown_flag = Arc::clone(&serving);
    builder
        .layer(AuthLayer::new(validator))
        .add_service(ConversationAudioServer::new(capture))
        .serve_with_shutdown(addr, async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown request");
            shutdown_flag.store(false, Ordering::SeqCst);
        })
        .await
        .context("main server terminated")?;

    info!("Successfully stopped both servers");
    Ok(())
}
