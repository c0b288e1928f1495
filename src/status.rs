//! Status indicator task.
//!
//! Portable stand-in for a board LED: a shared on/off flag toggled at a
//! fixed period while the device is running, so liveness can be observed
//! without hardware. Runs as its own task so a slow device step cannot
//! starve it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Shared handle to the indicator state
#[derive(Clone, Debug, Default)]
pub struct StatusLed {
    lit: Arc<AtomicBool>,
    toggles: Arc<AtomicU64>,
}

impl StatusLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the indicator, returning the new state
    pub fn toggle(&self) -> bool {
        let was_lit = self.lit.fetch_xor(true, Ordering::Relaxed);
        self.toggles.fetch_add(1, Ordering::Relaxed);
        !was_lit
    }

    #[allow(dead_code)]
    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::Relaxed)
    }

    /// Number of toggles since startup
    #[allow(dead_code)]
    pub fn toggle_count(&self) -> u64 {
        self.toggles.load(Ordering::Relaxed)
    }
}

/// Toggle `led` once per `period` until the shutdown signal arrives
pub async fn start_blink(
    led: StatusLed,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let lit = led.toggle();
        trace!(lit, "status indicator toggled");

        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("status indicator stopped");
                break;
            }

            _ = tokio::time::sleep(period) => {}
        }
    }
}
