use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use md2docx_core::Settings;
use md2docx_web::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load();

    // Refuse to start without a working converter
    let converter_version = match settings.converter.version().await {
        Ok(version) => version,
        Err(e) => {
            error!(error = %e, "Converter check failed");
            return Err(e).context("the document converter must be installed before starting");
        }
    };

    std::fs::create_dir_all(&settings.scratch_root).with_context(|| {
        format!(
            "failed to create scratch root {}",
            settings.scratch_root.display()
        )
    })?;

    let addr: SocketAddr = settings
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.bind))?;
    info!(
        scratch_root = %settings.scratch_root.display(),
        converter = %settings.converter.program.display(),
        "Configuration loaded"
    );

    let state = Arc::new(AppState {
        settings,
        converter_version,
    });
    let app = md2docx_web::app(state);

    info!("Listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
