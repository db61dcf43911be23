use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tapir::{config, notify::LogNotifier, routes, state::AppState, store::MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + daily rotating file under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "tapir.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Guards must outlive the server so the non-blocking writers flush
    let _log_guards = (stdout_guard, file_guard);

    // Load configuration (embedded defaults -> tapir.toml -> TAPIR_CONFIG -> env/.env)
    let app_cfg = config::load()?;

    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(LogNotifier::new(app_cfg.mail.sender.clone()));
    let state = AppState::new(app_cfg.clone(), store, notifier);

    let sweep_cancel = CancellationToken::new();
    let sweeper = state.limiter.spawn_sweeper(sweep_cancel.clone());
    let background = state.background.clone();

    let app = routes::router(state);

    let host = app_cfg.server.host.clone();
    let port = app_cfg.server.port;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(env = %app_cfg.server.environment, "tapir listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!("rate limiter sweep ended abnormally: {}", e);
    }

    info!("waiting for background tasks");
    if background.shutdown(app_cfg.shutdown_grace()).await {
        info!("stopped server");
    } else {
        warn!("stopped server with background tasks still running");
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
