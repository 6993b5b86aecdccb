use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feedback_review::{app, config::ReviewConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("WARN: failed to read .env: {e}");
        }
    }

    let cfg = ReviewConfig::from_env();

    // -----------------------------
    // Logging
    // -----------------------------
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: REVIEW_LOG='{}' is not a valid tracing filter ({e}); falling back to 'info'",
                    cfg.log_level
                );
                EnvFilter::new("info")
            }
        },
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "feedback review server starting");

    // -----------------------------
    // Shared state
    // -----------------------------
    let state = AppState::from_config(&cfg).await?;

    // -----------------------------
    // HTTP
    // -----------------------------
    let listener = TcpListener::bind(&cfg.bind_address).await?;
    info!(addr = %cfg.bind_address, "HTTP listening");

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
