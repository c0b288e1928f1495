use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

mod boot;
mod cli;
mod config;
mod device;
mod pnp;
mod status;
mod trust;

use crate::cli::Cli;
use crate::config::Config;
use crate::pnp::PnpDevice;
use crate::trust::TrustAnchor;

fn initialize_tracing() {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overridden using RUST_LOG
            EnvFilter::try_from_default_env()
                .unwrap_or(EnvFilter::default().add_directive("info".parse().unwrap())),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    initialize_tracing();

    let cli = match cli::parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            debug!(error = %err, "argument parsing failed");
            error!(
                "USAGE: {} [OPTIONS] <connection-string>",
                env!("CARGO_PKG_NAME")
            );
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Failed to initialize the application: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_cli(&cli);
    debug!("{config:#?}");

    // A broadcast send with no live receiver is dropped, so the loop's
    // receiver is taken before the signal task starts
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(shutdown_on_signal(shutdown_tx));

    let trust_anchor = match &config.trusted_certs {
        Some(path) => Some(
            TrustAnchor::from_pem_file(path)
                .await
                .with_context(|| format!("failed to load trust anchor {}", path.display()))?,
        ),
        None => None,
    };

    let device = PnpDevice::new(config.model_id.clone());

    boot::start(
        device,
        &cli.connection_string,
        trust_anchor.as_ref(),
        &config,
        shutdown_rx,
    )
    .await?;

    info!("shutting down");
    Ok(())
}

/// Translate SIGINT into the broadcast shutdown signal
async fn shutdown_on_signal(shutdown_tx: broadcast::Sender<()>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        debug!("termination signal received");
        let _ = shutdown_tx.send(());
    }
}
