use anyhow::Result;
use audiofork::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path =
        std::env::var("AUDIOFORK_CONFIG").unwrap_or_else(|_| "config/audiofork".to_string());
    let config = Config::load(&config_path)?;

    info!("audiofork v0.1.0");
    info!(
        "Main server port: {}, health check port: {}",
        config.server.port, config.server.health_port
    );

    audiofork::server::run(config).await
}
