use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relay_orchestrator::api::{self, AppState};
use relay_orchestrator::config::Config;
use relay_orchestrator::gateway::{GitHubGateway, RateLimitedGateway, RemoteGateway};
use relay_orchestrator::repository::{JobRegistry, JobStore, JsonFileStore};
use relay_orchestrator::service::{HttpCallbackNotifier, Orchestrator, WebhookVerifier};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound between two retention sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Relay Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Optional persistence
    let store: Option<Arc<dyn JobStore>> = match &config.state_dir {
        Some(dir) => {
            let store = JsonFileStore::open(dir)
                .await
                .with_context(|| format!("Failed to open job store at {}", dir.display()))?;
            tracing::info!("Persisting jobs to {}", dir.display());
            Some(Arc::new(store))
        }
        None => None,
    };

    let registry = Arc::new(JobRegistry::new(store.clone()));
    if let Some(store) = &store {
        let records = store.load_all().await.context("Failed to load stored jobs")?;
        let restored = registry.restore(records).await;
        tracing::info!("Restored {} jobs from the store", restored);
    }

    let github = GitHubGateway::new(config.github()?).context("Failed to build GitHub client")?;
    let gateway: Arc<dyn RemoteGateway> = Arc::new(RateLimitedGateway::new(
        Arc::new(github),
        config.gateway_max_in_flight,
    ));

    let notifier = HttpCallbackNotifier::new(
        config.policies().callback,
        config.callback_timeout,
        config.webhook_secret.clone(),
    )
    .context("Failed to build callback client")?;

    let orchestrator = Orchestrator::new(
        registry,
        gateway,
        Arc::new(notifier),
        config.orchestrator(),
    );

    let resumed = orchestrator.resume_restored().await;
    if resumed > 0 {
        tracing::info!("Resumed {} unfinished jobs", resumed);
    }

    if let Some(retention) = config.retention {
        spawn_retention_sweep(orchestrator.clone(), retention);
    }

    let verifier = WebhookVerifier::new(
        config.webhook_secret.clone(),
        config.allow_insecure_webhooks,
    );
    if config.webhook_secret.is_none() {
        if config.allow_insecure_webhooks {
            tracing::warn!("RELAY_WEBHOOK_SECRET not set, accepting unsigned webhooks");
        } else {
            tracing::warn!("RELAY_WEBHOOK_SECRET not set, webhooks will be rejected");
        }
    }

    // Build router with all API endpoints
    let app = api::create_router(AppState::new(orchestrator, verifier));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Relay Orchestrator stopped");
    Ok(())
}

fn spawn_retention_sweep(orchestrator: Orchestrator, retention: Duration) {
    let period = retention.min(MAX_SWEEP_INTERVAL);
    tracing::info!("Evicting terminal jobs older than {:?}", retention);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            orchestrator.evict_expired(retention).await;
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
