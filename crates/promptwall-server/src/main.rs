//! PromptWall Server
//!
//! Evaluates LLM prompts and responses against operator-defined policy
//! rules and returns an enforcement decision with any redacted text.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

use promptwall_server::config::LogFormat;
use promptwall_server::{create_router, AppState, Cli, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig::load(&cli)?;
    init_tracing(cli.verbose, config.log_format);

    info!("Starting PromptWall server");
    info!(policy = %config.policy_path.display(), "Configuration loaded");
    if config.admin_token.is_none() {
        warn!("No admin_token configured, policy updates are unauthenticated");
    }

    let metrics_handle = init_metrics()?;

    let addr: SocketAddr = config.bind_address().parse()?;
    let state = AppState::new(config, Some(metrics_handle))?;
    let audit = state.audit.clone();

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("PromptWall listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    if let Some(audit) = audit {
        audit.shutdown();
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("promptwall=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promptwall=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "promptwall_requests_total",
        "Total number of queries received"
    );
    metrics::describe_counter!(
        "promptwall_decisions_total",
        "Total number of decisions by outcome"
    );
    metrics::describe_counter!("promptwall_risks_total", "Total number of risks by type");
    metrics::describe_counter!(
        "promptwall_policy_updates_total",
        "Total number of policy update attempts by result"
    );
    metrics::describe_histogram!(
        "promptwall_evaluation_latency_us",
        metrics::Unit::Microseconds,
        "Query evaluation latency in microseconds"
    );
    metrics::describe_counter!(
        "promptwall_audit_records_total",
        "Total number of audit records persisted"
    );
    metrics::describe_counter!(
        "promptwall_audit_write_errors_total",
        "Total number of audit records that failed to persist"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
