use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_records::{config::Config, routes, services::auth as auth_service, state::AppState};

/// How long shutdown waits for background work to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("🛑 Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    if let Some(admin) = &config.bootstrap_admin {
        if let Err(e) =
            auth_service::ensure_bootstrap_account(state.accounts.as_ref(), admin).await
        {
            tracing::error!("❌ Failed to ensure bootstrap account: {}", e);
            return Err(e.into());
        }
    }

    let tasks = state.tasks.clone();
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("✅ Background tasks drained");

    Ok(())
}
