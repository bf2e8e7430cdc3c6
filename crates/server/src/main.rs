use anyhow::Result;
use axum::serve;
use flowsnap_core::{config::AppConfig, runtime::SnapshotRuntime};
use rustls::crypto::{ring::default_provider, CryptoProvider};
use server::router;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG` wins when set; `debug` and `trace` are widened to every crate of
/// the workspace. Otherwise `logging.level` applies to the flowsnap crates.
fn init_logging(config: &AppConfig) {
    let filter = if let Ok(env_filter) = std::env::var("RUST_LOG") {
        if env_filter == "debug" {
            EnvFilter::new("warn,flowsnap_core=debug,server=debug,tests=debug")
        } else if env_filter == "trace" {
            EnvFilter::new("warn,flowsnap_core=trace,server=trace,tests=trace")
        } else {
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
                EnvFilter::new("warn,flowsnap_core=debug,server=debug,tests=debug")
            })
        }
    } else {
        let level = config.logging.level.as_str();
        EnvFilter::try_new(format!("warn,flowsnap_core={level},server={level}"))
            .unwrap_or_else(|_| EnvFilter::new("warn,flowsnap_core=info,server=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CryptoProvider::install_default(default_provider())
        .map_err(|e| anyhow::anyhow!("Failed to install crypto provider: {e:?}"))?;

    let config =
        AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration loading failed: {e}"))?;

    init_logging(&config);
    info!("Starting flowsnap");
    debug!(
        chains = config.chains.len(),
        interval_secs = config.snapshot_interval().as_secs(),
        request_timeout_secs = config.request_timeout().as_secs(),
        data_dir = %config.storage.data_dir,
        "Configuration loaded"
    );

    let addr: SocketAddr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    let mut runtime = SnapshotRuntime::builder().with_config(config.clone()).build()?;

    runtime.hydrate().await;
    runtime.start_schedulers();

    let app = router::create_app(runtime.store().clone(), &config.server);
    info!(address = %addr, "Holder API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error occurred");
    }

    runtime.shutdown().await;
    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");

                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining requests and stopping schedulers");
}
