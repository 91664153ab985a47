//! Scheduled jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use janta_common::SweepConfig;
use janta_core::services::OverdueService;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// `tokio::time::interval` panics on a zero period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Whether to run the overdue sweep at all.
    pub enable_overdue_sweep: bool,
    /// Interval between overdue sweeps (default: 2 minutes).
    pub overdue_sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_overdue_sweep: true,
            overdue_sweep_interval: Duration::from_secs(120),
        }
    }
}

impl From<&SweepConfig> for SchedulerConfig {
    fn from(config: &SweepConfig) -> Self {
        Self {
            enable_overdue_sweep: config.enabled,
            overdue_sweep_interval: config.interval(),
        }
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Flag and escalate overdue reports. Returns how many were flagged.
    async fn sweep_overdue_reports(&self)
    -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait::async_trait]
impl JobExecutor for OverdueService {
    async fn sweep_overdue_reports(
        &self,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let summary = self.sweep_once(Utc::now()).await?;
        Ok(summary.flagged)
    }
}

/// Run the scheduler with the given configuration and executor.
///
/// The first sweep runs immediately so reports that went overdue while the
/// process was down are caught at startup. Ticks missed while a sweep is
/// still running are skipped, so sweeps never overlap within one process.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: &SchedulerConfig,
    executor: Arc<E>,
) -> Option<JoinHandle<()>> {
    if !config.enable_overdue_sweep {
        tracing::info!("Overdue sweep disabled");
        return None;
    }

    let period = config.overdue_sweep_interval.max(MIN_SWEEP_INTERVAL);
    tracing::info!(interval_secs = period.as_secs(), "Starting overdue sweep");

    Some(tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match executor.sweep_overdue_reports().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Flagged overdue reports");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Overdue sweep failed");
                }
            }
        }
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingExecutor {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl JobExecutor for CountingExecutor {
        async fn sweep_overdue_reports(
            &self,
        ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("database unavailable".into());
            }
            Ok(0)
        }
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert!(config.enable_overdue_sweep);
        assert_eq!(config.overdue_sweep_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_scheduler_config_from_sweep_config() {
        let sweep = SweepConfig {
            enabled: false,
            interval_secs: 30,
        };
        let config = SchedulerConfig::from(&sweep);
        assert!(!config.enable_overdue_sweep);
        assert_eq!(config.overdue_sweep_interval, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_runs_at_startup() {
        let executor = Arc::new(CountingExecutor::default());
        let handle = run_scheduler(&SchedulerConfig::default(), executor.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(executor.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(executor.runs.load(Ordering::SeqCst), 2);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sweep_does_not_stop_scheduler() {
        let executor = Arc::new(CountingExecutor {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let config = SchedulerConfig {
            enable_overdue_sweep: true,
            overdue_sweep_interval: Duration::from_secs(10),
        };
        let handle = run_scheduler(&config, executor.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(executor.runs.load(Ordering::SeqCst), 3);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_keeps_sweeping() {
        let executor = Arc::new(CountingExecutor::default());
        let config = SchedulerConfig {
            enable_overdue_sweep: true,
            overdue_sweep_interval: Duration::ZERO,
        };
        let handle = run_scheduler(&config, executor.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(executor.runs.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[test]
    fn test_disabled_sweep_spawns_nothing() {
        let config = SchedulerConfig {
            enable_overdue_sweep: false,
            ..SchedulerConfig::default()
        };
        let handle = run_scheduler(&config, Arc::new(CountingExecutor::default()));
        assert!(handle.is_none());
    }
}
