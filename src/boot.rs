//! Device bootstrap: one-time initialization followed by the poll loop.
//!
//! The loop drives a [`Device`] at a fixed cadence: one step, then a sleep,
//! then the next step, so successive steps are separated by at least the
//! configured interval. A broadcast shutdown signal ends the loop between
//! iterations; there is no other exit path.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::device::{ConnectionString, Device};
use crate::status::{self, StatusLed};
use crate::trust::TrustAnchor;

/// Initialize `device` and drive it until shutdown.
///
/// Initialization failure is returned before any step runs. After that the
/// poll loop and the status indicator run as sibling tasks; a signal on
/// `shutdown_rx` stops both and this function returns. A signal that
/// arrives while initialization is still running stays queued and ends the
/// bootstrap before the first step.
#[instrument(name = "boot", skip_all, err)]
pub async fn start<D: Device>(
    mut device: D,
    connection_string: &ConnectionString,
    trust_anchor: Option<&TrustAnchor>,
    config: &Config,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    // Taken before initialization so a signal sent during it is not missed
    let blink_rx = shutdown_rx.resubscribe();

    device
        .initialize(connection_string, trust_anchor)
        .await
        .context("device initialization failed")?;
    info!("device initialized, starting poll loop");

    let led = StatusLed::new();
    let blink = tokio::spawn(status::start_blink(led, config.status_period, blink_rx));

    poll_loop(&mut device, config.poll_interval, shutdown_rx).await;

    // The indicator stops on the same signal that ended the loop
    let _ = blink.await;

    Ok(())
}

/// Step, sleep `interval`, repeat.
///
/// A step error is logged and the loop keeps going; recovery is the
/// device's concern. Shutdown is honored between iterations, never by
/// preempting a running step; a signal that preceded the loop stops it
/// before the first step.
async fn poll_loop<D: Device>(
    device: &mut D,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    // A signal may already be queued if it arrived during initialization
    if shutdown_rx.try_recv().is_ok() {
        debug!("poll loop stopped");
        return;
    }

    loop {
        if let Err(e) = device.step().await {
            warn!(error = %e, "device step failed");
        }

        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("poll loop stopped");
                break;
            }

            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use tokio::time::timeout;

    /// Scripted device for driving the loop without any real device logic
    struct StubDevice {
        fail_initialize: bool,
        fail_steps: bool,
        initialize_delay: Duration,
        calls: Arc<Mutex<StubCalls>>,
    }

    #[derive(Default)]
    struct StubCalls {
        initialized_with: Option<String>,
        steps: Vec<Instant>,
    }

    impl StubDevice {
        fn new() -> Self {
            Self {
                fail_initialize: false,
                fail_steps: false,
                initialize_delay: Duration::ZERO,
                calls: Arc::new(Mutex::new(StubCalls::default())),
            }
        }

        fn failing_initialize() -> Self {
            Self {
                fail_initialize: true,
                ..Self::new()
            }
        }

        fn failing_steps() -> Self {
            Self {
                fail_steps: true,
                ..Self::new()
            }
        }

        fn slow_initialize(delay: Duration) -> Self {
            Self {
                initialize_delay: delay,
                ..Self::new()
            }
        }

        fn calls(&self) -> Arc<Mutex<StubCalls>> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl Device for StubDevice {
        async fn initialize(
            &mut self,
            connection_string: &ConnectionString,
            _trust_anchor: Option<&TrustAnchor>,
        ) -> Result<()> {
            self.calls.lock().unwrap().initialized_with =
                Some(connection_string.as_str().to_string());
            if !self.initialize_delay.is_zero() {
                tokio::time::sleep(self.initialize_delay).await;
            }
            if self.fail_initialize {
                anyhow::bail!("stub refused to initialize");
            }
            Ok(())
        }

        async fn step(&mut self) -> Result<()> {
            self.calls.lock().unwrap().steps.push(Instant::now());
            if self.fail_steps {
                anyhow::bail!("stub step failure");
            }
            Ok(())
        }
    }

    fn test_config(poll_interval: Duration) -> Config {
        Config {
            poll_interval,
            ..Config::default()
        }
    }

    /// Send the shutdown signal after `delay`
    fn shutdown_after(shutdown_tx: &broadcast::Sender<()>, delay: Duration) {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = shutdown_tx.send(());
        });
    }

    #[tokio::test]
    async fn test_initialization_failure_skips_poll_loop() {
        let device = StubDevice::failing_initialize();
        let calls = device.calls();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let err = start(
            device,
            &ConnectionString::from("HostName=h;DeviceId=d;SharedAccessKey=k"),
            None,
            &test_config(Duration::from_millis(100)),
            shutdown_rx,
        )
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("device initialization failed"));
        assert!(calls.lock().unwrap().steps.is_empty());
    }

    #[tokio::test]
    async fn test_connection_string_reaches_initializer_unchanged() {
        let raw = "  HostName=h;DeviceId=d;SharedAccessKey=YWJjZA==;extra=\u{00e9} ";
        let device = StubDevice::new();
        let calls = device.calls();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_after(&shutdown_tx, Duration::from_millis(50));

        start(
            device,
            &ConnectionString::from(raw),
            None,
            &test_config(Duration::from_millis(10)),
            shutdown_rx,
        )
        .await
        .unwrap();

        assert_eq!(calls.lock().unwrap().initialized_with.as_deref(), Some(raw));
    }

    #[tokio::test]
    async fn test_poll_counter_reaches_three_within_350ms() {
        let device = StubDevice::new();
        let calls = device.calls();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_after(&shutdown_tx, Duration::from_millis(350));

        start(
            device,
            &ConnectionString::from("HostName=h;DeviceId=d;SharedAccessKey=k"),
            None,
            &test_config(Duration::from_millis(100)),
            shutdown_rx,
        )
        .await
        .unwrap();

        // Steps land at 0, 100, 200 and 300 ms
        let steps = calls.lock().unwrap().steps.len();
        assert!(steps >= 3, "expected at least 3 steps in 350ms, got {steps}");
    }

    #[tokio::test]
    async fn test_steps_spaced_by_at_least_interval() {
        let device = StubDevice::new();
        let calls = device.calls();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_after(&shutdown_tx, Duration::from_millis(500));

        start(
            device,
            &ConnectionString::from("HostName=h;DeviceId=d;SharedAccessKey=k"),
            None,
            &test_config(Duration::from_millis(150)),
            shutdown_rx,
        )
        .await
        .unwrap();

        let calls = calls.lock().unwrap();
        assert!(calls.steps.len() >= 3);
        for pair in calls.steps.windows(2) {
            let time_between = pair[1] - pair[0];
            assert!(
                time_between >= Duration::from_millis(130), // Allow some tolerance for test timing
                "time between steps should be at least 150ms, but was {time_between:?}",
            );
        }
    }

    #[tokio::test]
    async fn test_step_errors_do_not_stop_the_loop() {
        let device = StubDevice::failing_steps();
        let calls = device.calls();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_after(&shutdown_tx, Duration::from_millis(250));

        start(
            device,
            &ConnectionString::from("HostName=h;DeviceId=d;SharedAccessKey=k"),
            None,
            &test_config(Duration::from_millis(100)),
            shutdown_rx,
        )
        .await
        .unwrap();

        let steps = calls.lock().unwrap().steps.len();
        assert!(steps >= 2, "loop should keep polling after step errors");
    }

    #[tokio::test]
    async fn test_shutdown_ends_loop_promptly() {
        let device = StubDevice::new();
        let calls = device.calls();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_after(&shutdown_tx, Duration::from_millis(50));

        // The interval is far longer than the test; shutdown must not wait for it
        timeout(
            Duration::from_millis(500),
            start(
                device,
                &ConnectionString::from("HostName=h;DeviceId=d;SharedAccessKey=k"),
                None,
                &test_config(Duration::from_secs(5)),
                shutdown_rx,
            ),
        )
        .await
        .expect("shutdown should end the loop before the interval elapses")
        .unwrap();

        assert_eq!(calls.lock().unwrap().steps.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_during_initialize_skips_poll_loop() {
        let device = StubDevice::slow_initialize(Duration::from_millis(200));
        let calls = device.calls();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_after(&shutdown_tx, Duration::from_millis(50));

        // The signal lands mid-initialize; the bootstrap must still wind down
        timeout(
            Duration::from_millis(600),
            start(
                device,
                &ConnectionString::from("HostName=h;DeviceId=d;SharedAccessKey=k"),
                None,
                &test_config(Duration::from_millis(100)),
                shutdown_rx,
            ),
        )
        .await
        .expect("a signal during initialization should still end the bootstrap")
        .unwrap();

        assert!(calls.lock().unwrap().steps.is_empty());
    }
}
