use clap::Parser;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::ConnectionString;
use crate::pnp::ModelId;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Device connection string for the IoT hub
    #[arg(value_name = "connection-string")]
    pub connection_string: ConnectionString,

    /// Path to a PEM bundle of trusted root certificates
    #[arg(
        env = "KINDLING_TRUSTED_CERTS",
        long = "trusted-certs",
        value_name = "path"
    )]
    pub trusted_certs: Option<PathBuf>,

    /// Device poll interval in milliseconds
    #[arg(
        env = "KINDLING_POLL_INTERVAL_MS",
        long = "poll-interval-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub poll_interval: Option<Duration>,

    /// Status indicator period in milliseconds
    #[arg(
        env = "KINDLING_STATUS_PERIOD_MS",
        long = "status-period-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub status_period: Option<Duration>,

    /// Model id announced by the sample device
    #[arg(env = "KINDLING_MODEL_ID", long = "model-id", value_name = "dtmi")]
    pub model_id: Option<ModelId>,
}

/// Parse the process arguments, leaving the usage-error exit to the caller
pub fn parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
