use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::pnp::ModelId;

/// Default delay between device poll iterations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default status indicator period
pub const DEFAULT_STATUS_PERIOD: Duration = Duration::from_secs(1);

/// Runtime settings for the bootstrap
#[derive(Clone, Debug)]
pub struct Config {
    /// Delay between device poll iterations
    pub poll_interval: Duration,

    /// Status indicator toggle period
    pub status_period: Duration,

    /// Optional PEM bundle of trusted root certificates
    pub trusted_certs: Option<PathBuf>,

    /// Model id announced by the sample device
    pub model_id: ModelId,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            status_period: DEFAULT_STATUS_PERIOD,
            trusted_certs: None,
            model_id: ModelId::default(),
        }
    }
}

impl Config {
    /// Build the runtime configuration from CLI arguments, using defaults
    /// for anything not given
    pub fn from_cli(cli: &Cli) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: cli.poll_interval.unwrap_or(defaults.poll_interval),
            status_period: cli.status_period.unwrap_or(defaults.status_period),
            trusted_certs: cli.trusted_certs.clone(),
            model_id: cli.model_id.clone().unwrap_or(defaults.model_id),
        }
    }
}
