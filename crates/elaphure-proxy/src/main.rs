//! Standalone proxy process.
//!
//! Creates the shared transport objects, connects to one probe and relays
//! batches until interrupted or until the session drops.

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use elaphure_proxy::{DEFAULT_PORT, Proxy, ProxyConfig, ResourceNames, config};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "elaphure-proxy")]
#[command(about = "Relay CMSIS-DAP command batches from shared memory to a networked probe")]
struct Cli {
    /// Probe host name or IP address
    #[arg(short, long)]
    address: String,
    /// Probe TCP port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Deadline for each wire read and write, in milliseconds
    #[arg(long)]
    io_timeout_ms: Option<u64>,
    /// Directory for the shared region and signal FIFOs
    #[arg(long)]
    runtime_dir: Option<PathBuf>,
    /// Allow vendor commands
    #[arg(long)]
    vendor_commands: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ProxyConfig {
        port: cli.port,
        io_timeout: cli.io_timeout_ms.map(Duration::from_millis),
        names: ResourceNames::in_dir(cli.runtime_dir.unwrap_or_else(config::default_runtime_dir)),
        ..ProxyConfig::default()
    };
    let proxy = Proxy::new(config);

    let (disconnects, mut disconnected) = mpsc::unbounded_channel::<String>();
    proxy.set_on_connect(Some(Arc::new(|message: &str| info!(message, "probe connected"))));
    proxy.set_on_disconnect(Some(Arc::new(move |message: &str| {
        let _ = disconnects.send(message.to_string());
    })));

    if proxy.change_config(cli.vendor_commands) != 0 {
        error!(dir = %proxy.config().names.dir.display(), "could not create transport objects");
        return ExitCode::FAILURE;
    }

    if let Err(err) = proxy.try_start_with_address(&cli.address) {
        error!(error = %err, "could not start session");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build runtime");
            return ExitCode::FAILURE;
        },
    };

    let code = runtime.block_on(async {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for interrupt");
                }
                info!("interrupted, shutting down");
                ExitCode::SUCCESS
            },
            message = disconnected.recv() => {
                error!(reason = message.as_deref().unwrap_or("unknown"), "session ended");
                ExitCode::FAILURE
            },
        }
    });

    proxy.stop();
    proxy.release();
    code
}
