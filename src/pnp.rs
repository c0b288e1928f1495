//! Sample Plug and Play device.
//!
//! Stands in for the generated device module of a real sample project: it
//! parses the connection string on initialize, announces its model id, then
//! produces simulated telemetry at a fixed period. The transport that would
//! carry the telemetry to the hub is an external concern and is not
//! implemented here; payloads go to the log instead.

pub mod connection_string;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::device::{ConnectionString, Device};
use crate::trust::TrustAnchor;

use self::connection_string::DeviceCredentials;

/// Interval between telemetry messages from the simulated sensors
const TELEMETRY_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq)]
pub enum ModelIdError {
    #[error("model id must start with `dtmi:`")]
    Scheme,

    #[error("model id must end with `;<version>`")]
    Version,

    #[error("invalid model id path segment `{0}`")]
    Segment(String),
}

/// Digital twin model identifier, e.g. `dtmi:com:example:SampleDevice;1`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelId(String);

impl ModelId {
    #[allow(dead_code)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelId {
    fn default() -> Self {
        ModelId("dtmi:com:example:SampleDevice;1".to_string())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("dtmi:").ok_or(ModelIdError::Scheme)?;
        let (path, version) = rest.rsplit_once(';').ok_or(ModelIdError::Version)?;

        // Version is a positive integer without leading zeros
        if version.is_empty()
            || version.starts_with('0')
            || !version.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ModelIdError::Version);
        }

        for segment in path.split(':') {
            let valid = segment
                .bytes()
                .next()
                .is_some_and(|b| b.is_ascii_alphabetic())
                && !segment.ends_with('_')
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_');
            if !valid {
                return Err(ModelIdError::Segment(segment.to_string()));
            }
        }

        Ok(ModelId(s.to_string()))
    }
}

/// Telemetry payload reported by the simulated sensors
#[derive(Clone, Debug, Serialize)]
struct Telemetry {
    temperature: f64,
    humidity: f64,
    message_id: u64,
}

/// Connection state established by a successful initialize
struct Session {
    credentials: DeviceCredentials,
    last_telemetry: Instant,
    messages_sent: u64,
}

/// Sample device driven by the bootstrap loop
pub struct PnpDevice {
    model_id: ModelId,
    telemetry_period: Duration,
    session: Option<Session>,
}

impl PnpDevice {
    pub fn new(model_id: ModelId) -> Self {
        Self {
            model_id,
            telemetry_period: TELEMETRY_PERIOD,
            session: None,
        }
    }

    #[allow(dead_code)]
    fn with_telemetry_period(mut self, period: Duration) -> Self {
        self.telemetry_period = period;
        self
    }

    /// Number of telemetry messages produced since initialize
    #[allow(dead_code)]
    pub fn messages_sent(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.messages_sent)
    }
}

#[async_trait]
impl Device for PnpDevice {
    async fn initialize(
        &mut self,
        connection_string: &ConnectionString,
        trust_anchor: Option<&TrustAnchor>,
    ) -> Result<()> {
        let credentials = DeviceCredentials::parse(connection_string.as_str())
            .context("invalid device connection string")?;

        if let Some(anchor) = trust_anchor {
            debug!(
                certificates = anchor.certificate_count(),
                "pinning trust anchor for the device transport"
            );
        }

        info!(
            device = %credentials.device_id,
            hub = %credentials.host_name,
            model = %self.model_id,
            "device session established"
        );

        self.session = Some(Session {
            credentials,
            last_telemetry: Instant::now(),
            messages_sent: 0,
        });

        Ok(())
    }

    async fn step(&mut self) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .context("device is not initialized")?;

        if session.last_telemetry.elapsed() >= self.telemetry_period {
            let telemetry = Telemetry {
                temperature: rand::random_range(18.0..28.0),
                humidity: rand::random_range(40.0..60.0),
                message_id: session.messages_sent + 1,
            };

            info!(
                device = %session.credentials.device_id,
                payload = %serde_json::to_string(&telemetry)?,
                "telemetry ready for dispatch"
            );

            session.messages_sent += 1;
            session.last_telemetry = Instant::now();
        }

        Ok(())
    }
}
