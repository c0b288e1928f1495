use anyhow::Result;
use async_trait::async_trait;
use std::ops::Deref;

use crate::trust::TrustAnchor;

/// Device connection string, carried as an opaque value.
///
/// The bootstrap hands this to [`Device::initialize`] exactly as it was
/// given on the command line: no trimming, no truncation, no re-encoding.
/// Interpreting its contents is the device implementation's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionString(String);

impl ConnectionString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ConnectionString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for ConnectionString {
    fn from(s: String) -> Self {
        ConnectionString(s)
    }
}

impl From<&str> for ConnectionString {
    fn from(s: &str) -> Self {
        ConnectionString(s.to_string())
    }
}

/// Trait for abstracting the device implementation behind the bootstrap loop
#[async_trait]
pub trait Device {
    /// One-time device setup.
    ///
    /// Receives the connection string as passed on the command line and the
    /// trust anchor, if one was configured. An error aborts the bootstrap
    /// before the poll loop starts.
    async fn initialize(
        &mut self,
        connection_string: &ConnectionString,
        trust_anchor: Option<&TrustAnchor>,
    ) -> Result<()>;

    /// Perform one unit of device work.
    ///
    /// Called once per loop iteration. Implementations must return promptly;
    /// the loop never preempts a running step and shutdown only takes effect
    /// between iterations. A step error is logged by the loop and does not
    /// stop it.
    async fn step(&mut self) -> Result<()>;
}
