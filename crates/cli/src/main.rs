use clap::Parser;
use ferrous_doh_application::ports::{ProxyBackend, ProxyEvents};
use ferrous_doh_domain::{BackendKind, CliOverrides, DeviceIdentity};
use ferrous_doh_infrastructure::events::TracingEvents;
use ferrous_doh_infrastructure::system::probe_device_identity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod bootstrap;
mod di;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ferrous-doh")]
#[command(version)]
#[command(about = "Ferrous DoH - Local DNS to DNS-over-HTTPS forwarding proxy")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Configuration ID appended to the upstream URL
    #[arg(long, value_name = "ID")]
    configuration: Option<String>,

    /// Do not send device name, model and ID upstream
    #[arg(long)]
    no_report_device: bool,

    /// Backend: auto, tunnel or native
    #[arg(short = 'b', long)]
    backend: Option<BackendKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        log_level: cli.log_level.clone(),
        configuration: cli.configuration.clone(),
        no_report_device: cli.no_report_device,
        backend: cli.backend,
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting Ferrous DoH v{}", version);

    let identity = if config.upstream.report_device_name {
        probe_device_identity(version)
    } else {
        DeviceIdentity::anonymous(version)
    };

    let events: Arc<dyn ProxyEvents> = Arc::new(TracingEvents);
    let backend = di::build_backend(&config, events)?;
    backend.set_config_id(&config.upstream.configuration);
    backend.set_device_info(identity);

    if let Err(e) = backend.start().await {
        error!(backend = backend.name(), error = %e, "Failed to start proxy");
        return Err(e.into());
    }
    info!(backend = backend.name(), "Proxy running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
        _ = wait_for_sigterm() => info!("Received SIGTERM, shutting down"),
    }

    if let Err(e) = backend.stop().await {
        error!(error = %e, "Failed to stop proxy");
    }
    if !backend.wait_stopped(SHUTDOWN_GRACE).await {
        warn!(
            state = %backend.state().await,
            "Proxy did not finish stopping in time"
        );
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
