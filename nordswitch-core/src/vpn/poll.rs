//! Bounded sleep-and-recheck polling
//!
//! Both state-transition waits ("did the VPN become connected?") and GUI
//! readiness detection ("has the desktop client finished initializing?")
//! are the same shape: sample a condition at a fixed interval until it
//! holds or a monotonic deadline elapses. There is no cancellation beyond
//! the deadline itself.

use crate::error::{CliError, Result};
use crate::vpn::process;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Poll a condition until it holds or the deadline elapses
///
/// The probe is evaluated once per interval. Transient failures (CLI
/// errors, e.g. a status query hitting the daemon mid-reconfiguration)
/// are swallowed and polling continues; terminal failures (configuration
/// errors) abort immediately. On deadline the poll fails with
/// [`CliError::StateTimeout`] naming the awaited state.
pub async fn wait_until<F, Fut>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match probe().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) if e.is_transient() => {
                debug!(error = %e, "Transient failure while waiting for {}, still polling", what);
            }
            Err(e) => return Err(e),
        }
        sleep(interval).await;
    }

    Err(CliError::StateTimeout {
        state: what.to_string(),
        seconds: timeout.as_secs(),
    }
    .into())
}

/// Fixed-capacity trailing window of process memory samples (MB)
///
/// Used only during GUI readiness detection and discarded afterwards.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl StabilityWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a sample, evicting the oldest once the window is full
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Whether memory usage has settled
    ///
    /// Stable means: the window is full, the latest sample exceeds the
    /// minimum-memory threshold, and the maximum absolute deviation from
    /// the window mean stays within `variance_pct` percent of the mean.
    /// This is a heuristic proxy for "the GUI finished initializing",
    /// not a guarantee.
    pub fn is_stable(&self, threshold_mb: f64, variance_pct: f64) -> bool {
        if !self.is_full() {
            return false;
        }
        let Some(latest) = self.latest() else {
            return false;
        };
        if latest <= threshold_mb {
            return false;
        }

        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        if mean <= 0.0 {
            return false;
        }
        let max_deviation = self
            .samples
            .iter()
            .map(|sample| (sample - mean).abs())
            .fold(0.0_f64, f64::max);

        (max_deviation / mean) * 100.0 <= variance_pct
    }
}

/// Tuning for GUI readiness detection
#[derive(Debug, Clone)]
pub struct ReadinessOptions {
    /// Minimum resident memory (MB) before the app counts as started
    pub threshold_mb: f64,
    /// Number of trailing samples that must agree (6 samples at 0.5s
    /// spacing spans ~3 seconds)
    pub window: usize,
    /// Maximum allowed deviation from the window mean, in percent
    pub variance_pct: f64,
    /// Spacing between memory samples
    pub interval: Duration,
    /// Overall deadline for reaching steady state
    pub timeout: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            threshold_mb: 200.0,
            window: 6,
            variance_pct: 1.0,
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Wait until the named process reaches steady memory usage
///
/// Samples the process's resident memory at the configured interval and
/// declares readiness per [`StabilityWindow::is_stable`]. Intervals where
/// the process is not (yet) running contribute no sample. On overall
/// timeout fails with [`CliError::NotReady`].
pub async fn wait_for_steady_state(process_name: &str, opts: &ReadinessOptions) -> Result<()> {
    let deadline = Instant::now() + opts.timeout;
    let mut window = StabilityWindow::new(opts.window);

    while Instant::now() < deadline {
        if let Some(memory_mb) = process::resident_memory_mb(process_name) {
            window.push(memory_mb);
            if window.is_stable(opts.threshold_mb, opts.variance_pct) {
                info!(process = process_name, memory_mb, "Process reached steady state");
                return Ok(());
            }
        }
        sleep(opts.interval).await;
    }

    Err(CliError::NotReady {
        seconds: opts.timeout.as_secs(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_not_stable_until_full() {
        let mut window = StabilityWindow::new(3);
        window.push(300.0);
        window.push(300.0);
        assert!(!window.is_stable(200.0, 1.0));

        window.push(300.0);
        assert!(window.is_stable(200.0, 1.0));
    }

    #[test]
    fn test_window_requires_threshold() {
        let mut window = StabilityWindow::new(3);
        for _ in 0..3 {
            window.push(150.0);
        }
        // Perfectly flat but below the minimum-memory threshold
        assert!(!window.is_stable(200.0, 1.0));
    }

    #[test]
    fn test_outlier_blocks_stability_until_evicted() {
        let mut window = StabilityWindow::new(3);
        window.push(300.0);
        window.push(400.0); // outlier
        window.push(300.0);
        assert!(!window.is_stable(200.0, 1.0));

        // One more flat sample: outlier still inside the window
        window.push(300.0);
        assert!(!window.is_stable(200.0, 1.0));

        // Outlier evicted, window flat again
        window.push(300.0);
        assert!(window.is_stable(200.0, 1.0));
    }

    #[test]
    fn test_variance_boundary_is_inclusive() {
        let mut window = StabilityWindow::new(2);
        // mean 300, max deviation 3 -> exactly 1.0%
        window.push(297.0);
        window.push(303.0);
        assert!(window.is_stable(200.0, 1.0));
        assert!(!window.is_stable(200.0, 0.5));
    }
}
