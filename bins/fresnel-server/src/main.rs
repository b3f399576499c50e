use clap::Parser;

use fresnel_api_server::AppState;
use fresnel_engine::bootstrap::Engine;
use fresnel_engine::config::FresnelConfig;

#[derive(Parser)]
#[command(name = "fresnel-server", about = "CRUD record server with search index mirroring")]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, default_value = "config.toml", env = "FRESNEL_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config, "loading configuration");
    let config = match FresnelConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    tracing::info!(mirrors = config.mirrors.len(), "bootstrapping engine");
    let engine = match Engine::bootstrap(&config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "failed to bootstrap engine");
            std::process::exit(1);
        }
    };

    // --- API server (HTTP CRUD + mirror middleware) ---
    let state = AppState {
        store: engine.store(),
        interceptor: engine.interceptor(),
    };
    let api_port = config.api_port;
    let api_token = engine.cancellation_token();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = fresnel_api_server::run(api_port, state, api_token).await {
            tracing::error!(error = %e, "api server error");
        }
    });

    tracing::info!(port = config.api_port, "api server listening");
    tracing::info!("fresnel-server started, press Ctrl+C to stop");

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to register SIGTERM handler");
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received, shutting down...");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down...");
        }
    }

    // Cancelling the shared token stops the API server as well; the
    // engine drains queued propagation jobs and flushes the store.
    engine.shutdown().await;
    let _ = api_handle.await;

    tracing::info!("shutdown complete");
}
