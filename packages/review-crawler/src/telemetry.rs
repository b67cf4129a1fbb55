//! Per-stage duration and GPU power telemetry.
//!
//! A [`StageTracker`] wraps one stage execution. If a power probe can be
//! opened, readings are taken on a background thread until the stage
//! finishes. [`StageTracker::finish`] waits for the sampler asynchronously
//! for at most [`TELEMETRY_JOIN_TIMEOUT`], then cancels a probe that is
//! still blocked. Telemetry failures only cost readings.

use std::io::{BufRead, BufReader, Lines};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::TelemetrySettings;
use crate::limits::{TELEMETRY_JOIN_TIMEOUT, TELEMETRY_SAMPLE_INTERVAL};
use crate::types::audit::StepMetric;

/// Stage names as they appear in the result artifact.
pub mod stage_names {
    pub const GENERATE_QUERY: &str = "Generate Query";
    pub const RETRIEVAL: &str = "Retrieval";
    pub const EXTRACT: &str = "Extract and Detect";
    pub const REPAIR: &str = "Repair";
    pub const VERIFY: &str = "Verify Reviews";
}

/// A source of power readings.
pub trait PowerProbe: Send {
    /// Block until the next reading in watts. `None` ends sampling.
    fn sample(&mut self) -> Option<f64>;

    /// Handle that unblocks a pending `sample` call from another thread.
    fn canceller(&self) -> Option<Canceller> {
        None
    }
}

/// Aborts a blocked probe.
pub type Canceller = Box<dyn FnOnce() + Send>;

/// Opens a fresh probe for each stage.
pub trait PowerProbeFactory: Send + Sync {
    /// `None` when no probe is available; the stage then reports 0.0 W.
    fn connect(&self) -> Option<Box<dyn PowerProbe>>;
}

/// Factory that never yields a probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProbeFactory;

impl PowerProbeFactory for NoopProbeFactory {
    fn connect(&self) -> Option<Box<dyn PowerProbe>> {
        None
    }
}

/// Pick the probe factory for the configured telemetry host.
pub fn probe_factory(settings: &TelemetrySettings) -> Arc<dyn PowerProbeFactory> {
    match &settings.ssh_host {
        Some(host) => Arc::new(SshPowerProbeFactory::new(host.clone(), settings.ssh_user.clone())),
        None => Arc::new(NoopProbeFactory),
    }
}

/// Streams `nvidia-smi` power readings from a remote host over `ssh`.
///
/// Uses key-based authentication only (`BatchMode=yes`), so a host that
/// would prompt for a password fails fast instead of hanging.
#[derive(Debug, Clone)]
pub struct SshPowerProbeFactory {
    host: String,
    user: Option<String>,
}

impl SshPowerProbeFactory {
    pub fn new(host: impl Into<String>, user: Option<String>) -> Self {
        Self {
            host: host.into(),
            user,
        }
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

impl PowerProbeFactory for SshPowerProbeFactory {
    fn connect(&self) -> Option<Box<dyn PowerProbe>> {
        let query = format!(
            "nvidia-smi --query-gpu=power.draw --format=csv,noheader,nounits --loop-ms={}",
            TELEMETRY_SAMPLE_INTERVAL.as_millis()
        );

        let spawned = Command::new("ssh")
            .args(["-o", "BatchMode=yes", "-o", "ConnectTimeout=5"])
            .arg(self.destination())
            .arg(query)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(host = %self.host, error = %e, "Failed to start power monitor");
                return None;
            }
        };

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return None;
        };

        Some(Box::new(SshPowerProbe {
            child: Arc::new(Mutex::new(child)),
            lines: BufReader::new(stdout).lines(),
        }))
    }
}

struct SshPowerProbe {
    child: Arc<Mutex<Child>>,
    lines: Lines<BufReader<ChildStdout>>,
}

fn kill(child: &Mutex<Child>) {
    if let Ok(mut child) = child.lock() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl PowerProbe for SshPowerProbe {
    fn sample(&mut self) -> Option<f64> {
        loop {
            let line = self.lines.next()?.ok()?;
            match line.trim().parse::<f64>() {
                Ok(watts) => return Some(watts),
                // "[N/A]" and similar lines carry no reading
                Err(_) => continue,
            }
        }
    }

    // Killing ssh closes stdout, which ends the pending read.
    fn canceller(&self) -> Option<Canceller> {
        let child = Arc::clone(&self.child);
        Some(Box::new(move || kill(&child)))
    }
}

impl Drop for SshPowerProbe {
    fn drop(&mut self) {
        kill(&self.child);
    }
}

struct Sampler {
    stop: Arc<AtomicBool>,
    readings: mpsc::Receiver<f64>,
    done: oneshot::Receiver<()>,
    cancel: Option<Canceller>,
}

/// Times one stage and collects power readings while it runs.
pub struct StageTracker {
    step: String,
    started: Instant,
    sampler: Option<Sampler>,
}

impl StageTracker {
    /// Start timing `step`, sampling power if a probe is available.
    pub fn start(step: impl Into<String>, factory: &dyn PowerProbeFactory) -> Self {
        let step = step.into();
        debug!(step = %step, "Stage started");

        let sampler = factory.connect().map(|mut probe| {
            let stop = Arc::new(AtomicBool::new(false));
            let (reading_tx, readings) = mpsc::channel();
            let (done_tx, done) = oneshot::channel();
            let cancel = probe.canceller();
            let stop_flag = Arc::clone(&stop);

            thread::spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    match probe.sample() {
                        Some(watts) => {
                            if reading_tx.send(watts).is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                drop(probe);
                let _ = done_tx.send(());
            });

            Sampler {
                stop,
                readings,
                done,
                cancel,
            }
        });

        Self {
            step,
            started: Instant::now(),
            sampler,
        }
    }

    /// Stop sampling and produce the stage's metric.
    pub async fn finish(self) -> StepMetric {
        let duration = self.started.elapsed().as_secs_f64();
        let mut sampler_timed_out = false;

        let readings: Vec<f64> = match self.sampler {
            Some(sampler) => {
                sampler.stop.store(true, Ordering::Relaxed);
                if tokio::time::timeout(TELEMETRY_JOIN_TIMEOUT, sampler.done)
                    .await
                    .is_err()
                {
                    sampler_timed_out = true;
                    warn!(step = %self.step, "Power sampler did not stop in time, cancelling probe");
                    if let Some(cancel) = sampler.cancel {
                        cancel();
                    }
                }
                sampler.readings.try_iter().collect()
            }
            None => Vec::new(),
        };

        let avg_gpu_power_watts = if readings.is_empty() {
            0.0
        } else {
            readings.iter().sum::<f64>() / readings.len() as f64
        };

        info!(
            step = %self.step,
            duration_secs = %format!("{duration:.2}"),
            avg_gpu_power_watts = %format!("{avg_gpu_power_watts:.2}"),
            samples = readings.len(),
            "Stage finished"
        );

        StepMetric {
            step: self.step,
            duration,
            avg_gpu_power_watts,
            samples: readings.len(),
            sampler_timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticPowerProbe;
    use std::time::Duration;

    #[tokio::test]
    async fn test_without_probe_reports_zero_watts() {
        let metric = StageTracker::start(stage_names::VERIFY, &NoopProbeFactory).finish().await;
        assert_eq!(metric.step, "Verify Reviews");
        assert_eq!(metric.avg_gpu_power_watts, 0.0);
        assert_eq!(metric.samples, 0);
        assert!(metric.duration >= 0.0);
        assert!(!metric.sampler_timed_out);
    }

    #[tokio::test]
    async fn test_averages_readings() {
        let factory = StaticPowerProbe::factory(vec![100.0, 200.0], Duration::ZERO);
        let tracker = StageTracker::start(stage_names::EXTRACT, &factory);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let metric = tracker.finish().await;

        assert_eq!(metric.samples, 2);
        assert_eq!(metric.avg_gpu_power_watts, 150.0);
        assert!(!metric.sampler_timed_out);
    }

    #[tokio::test]
    async fn test_blocked_sampler_times_out_with_metric() {
        let factory = StaticPowerProbe::factory(vec![80.0], Duration::from_secs(30));
        let tracker = StageTracker::start(stage_names::REPAIR, &factory);

        let started = Instant::now();
        let metric = tracker.finish().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(metric.step, "Repair");
        assert!(metric.sampler_timed_out);
        assert_eq!(metric.samples, 0);
        assert_eq!(metric.avg_gpu_power_watts, 0.0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_finish_yields_to_other_tasks() {
        let factory = StaticPowerProbe::factory(vec![80.0], Duration::from_secs(30));
        let tracker = StageTracker::start(stage_names::VERIFY, &factory);

        // On a single-threaded runtime this task only runs if finish yields
        let ticks = tokio::spawn(async {
            let mut ticks = 0;
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ticks += 1;
            }
            ticks
        });

        let metric = tracker.finish().await;
        assert!(metric.sampler_timed_out);
        assert_eq!(ticks.await.unwrap(), 5);
    }

    #[test]
    fn test_probe_factory_selection() {
        let settings = TelemetrySettings::default();
        assert!(probe_factory(&settings).connect().is_none());
    }
}
