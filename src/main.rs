use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbmonitor::cli::{self, Cli};
use dbmonitor::engine::CHECK_TEMPLATES;
use dbmonitor::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if !cli.is_serve() {
        return cli::run_command(&cli).await;
    }

    let config = cli.load_config()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dbmonitor v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db = dbmonitor::db::init(&config.server.data_dir).await?;

    if config.seed.reference_data {
        let check_types = dbmonitor::db::seed_check_types(&db, CHECK_TEMPLATES).await?;
        let databases = dbmonitor::db::seed_reference_databases(&db).await?;
        if check_types > 0 || databases > 0 {
            tracing::info!(check_types, databases, "Seeded reference data");
        }
    }

    dbmonitor::api::ensure_admin_user(&db, &config.auth).await?;

    let report = dbmonitor::startup::run_startup_checks(&config, &db).await;
    if !report.all_critical_passed {
        if cli.skip_checks {
            tracing::warn!("Critical startup checks failed, continuing because --skip-checks is set");
        } else {
            anyhow::bail!(
                "Startup checks failed: {}",
                report.critical_failures().join(", ")
            );
        }
    }

    let mut state = AppState::new(config.clone(), db);
    if config.metrics.enabled {
        let handle = dbmonitor::api::metrics::init_metrics()?;
        state = state.with_metrics(handle);
    }
    let state = Arc::new(state);

    if config.rate_limit.enabled {
        dbmonitor::api::rate_limit::spawn_cleanup_task(
            state.rate_limiter.clone(),
            config.rate_limit.cleanup_interval,
        );
    }

    let app = dbmonitor::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
