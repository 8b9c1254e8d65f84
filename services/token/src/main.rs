use anyhow::Context;
use key_common::{
    init_tracing, BroadcastRotationChannel, FileKeyHistory, InMemoryKeyHistory, KeyHistory,
    TracingConfig,
};
use std::sync::Arc;
use token_service::jwks::JwksPublisher;
use token_service::{Config, KeyRotationService, SigningKeyManager};
use tracing::{info, warn};

/// Buffered rotation events per subscriber.
const ROTATION_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(
        &TracingConfig::default()
            .with_service_name("token-service")
            .with_lookup(|name| std::env::var(name).ok()),
    );

    info!("Starting Token Service");

    let config = Config::from_env().context("loading configuration")?;

    let history: Arc<dyn KeyHistory> = match &config.history_path {
        Some(path) => Arc::new(
            FileKeyHistory::open(path, config.history_capacity)
                .with_context(|| format!("opening key history at {}", path.display()))?,
        ),
        None => Arc::new(InMemoryKeyHistory::new(config.history_capacity)?),
    };
    info!(
        capacity = history.capacity(),
        retained = history.len(),
        durable = config.history_path.is_some(),
        "Key history ready"
    );

    let manager = Arc::new(SigningKeyManager::new(config.key.clone(), history));
    let channel = BroadcastRotationChannel::new(ROTATION_CHANNEL_CAPACITY);
    let rotation = Arc::new(KeyRotationService::new(
        Arc::clone(&manager),
        Arc::new(channel),
        &config.jwt_issuer,
        config.rotation_interval,
    ));

    let startup = Arc::clone(&rotation);
    let record = tokio::task::spawn_blocking(move || startup.startup())
        .await
        .context("startup rotation task")?
        .context("startup key rotation")?;
    info!(
        kid = %record.kid(),
        algorithm = %record.algorithm(),
        jwks_keys = JwksPublisher::new(Arc::clone(&manager)).jwks().keys.len(),
        "Token Service ready"
    );

    let scheduler = rotation.spawn_scheduler(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    });

    scheduler.await.context("rotation scheduler")?;
    info!("Token Service stopped");

    Ok(())
}
