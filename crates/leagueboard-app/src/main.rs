// League board entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Build the upstream client and matchday cache
// 4. Spawn the refresh scheduler
// 5. Serve the HTTP API until Ctrl+C
// 6. Stop the scheduler

use std::sync::Arc;

use anyhow::Context;
use leagueboard_app::config;
use leagueboard_app::server::{self, ApiState};
use leagueboard_app::upstream::GamingApiClient;
use leagueboard_core::{
    Clock, ManagerSnapshotFetcher, MatchdayCache, PublicCatalogFetcher, RefreshScheduler,
    SystemClock,
};
use tokio::sync::oneshot;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("League board starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} managers tracked, default matchday {}",
        config.league.managers.len(),
        config.league.default_matchday
    );

    // 3. Upstream client and cache
    let client = Arc::new(GamingApiClient::from_config(&config));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(MatchdayCache::new(
        PublicCatalogFetcher::new(client.clone()),
        ManagerSnapshotFetcher::new(client, config.aliases()),
        config.league.managers.clone(),
        clock.clone(),
    ));

    // 4. Refresh scheduler
    let (stop_tx, stop_rx) = oneshot::channel();
    let scheduler = RefreshScheduler::new(cache.clone(), clock, config.schedule.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(stop_rx));

    // 5. HTTP API
    let router = server::build_router(ApiState {
        cache,
        default_matchday: config.league.default_matchday,
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("HTTP API listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("HTTP server error: {}", e);
    }

    // 6. Cleanup
    let _ = stop_tx.send(());
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), scheduler_handle).await;

    info!("League board shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("leagueboard_app=info,leagueboard_core=info,warn")
        }))
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
