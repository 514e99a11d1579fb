pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod lifecycle; // Medication request state machine
pub mod models;
pub mod notify; // Parent notification queue + dispatcher

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Start the school health backend and serve until Ctrl-C.
pub async fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let db_path = config::database_path();
    let bind_addr = config::bind_addr()?;

    // Run migrations once up front so a broken database fails startup.
    db::open_database(&db_path)
        .map_err(|e| format!("Cannot open database {}: {e}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "Database ready");

    let (notifier, dispatcher) =
        notify::notification_channel(db_path.clone(), config::NOTIFICATION_CHANNEL_CAPACITY);
    let dispatcher = dispatcher.spawn();

    let core = Arc::new(core_state::CoreState::new(db_path, Arc::new(notifier)));
    let server = api::start_api_server(core.clone(), bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }

    server.stop().await;
    if let Err(e) = core.flush_and_prune_audit() {
        tracing::warn!(error = %e, "Final audit flush failed");
    }

    // The dispatcher exits once the last notifier clone (held by `core`) is gone.
    drop(core);
    if let Err(e) = dispatcher.await {
        tracing::error!("Notification dispatcher failed: {e}");
    }

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
