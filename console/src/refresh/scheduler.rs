//! Scheduled rule refresh - periodic reloading while the console watches.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use aml_rule_store::StoreError;
use log::{error, info};
use parking_lot::RwLock;
use tokio::time::{interval, MissedTickBehavior};

use super::service::{RefreshService, RefreshStats};

/// Configuration for the scheduled refresh.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between refresh operations
    pub refresh_interval: Duration,
    /// Whether the scheduler is enabled
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            enabled: true,
        }
    }
}

/// Periodically refreshes the rule store until told to stop.
pub struct RefreshScheduler {
    service: Arc<RefreshService>,
    config: SchedulerConfig,
    /// Timestamp of the last applied refresh (0 = never)
    last_refresh_at: RwLock<u64>,
}

impl RefreshScheduler {
    pub fn new(service: Arc<RefreshService>, config: SchedulerConfig) -> Self {
        Self {
            service,
            config,
            last_refresh_at: RwLock::new(0),
        }
    }

    /// Returns the timestamp of the last applied refresh.
    pub fn last_refresh(&self) -> u64 {
        *self.last_refresh_at.read()
    }

    /// Refreshes on every tick (the first one immediately) and hands each
    /// result to `on_refresh`, until `shutdown` resolves.
    pub async fn run<F, S>(&self, mut on_refresh: F, shutdown: S)
    where
        F: FnMut(&Result<RefreshStats, StoreError>),
        S: Future<Output = ()>,
    {
        if !self.config.enabled {
            info!("Scheduled refresh is disabled, skipping");
            return;
        }

        info!(
            "Starting scheduled refresh with {}-second interval",
            self.config.refresh_interval.as_secs()
        );

        let mut ticker = interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduled refresh stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let result = self.do_refresh().await;
                    on_refresh(&result);
                }
            }
        }
    }

    /// Executes one refresh cycle.
    async fn do_refresh(&self) -> Result<RefreshStats, StoreError> {
        let result = self.service.refresh_now().await;
        self.record(&result);
        result
    }

    fn record(&self, result: &Result<RefreshStats, StoreError>) {
        match result {
            Ok(stats) if stats.applied => {
                info!(
                    "Scheduled refresh completed: {} rules in {} ms",
                    stats.rules_refreshed, stats.duration_ms
                );
                *self.last_refresh_at.write() = stats.timestamp;
            }
            Ok(_) => {
                info!("Scheduled refresh overtaken by a newer one");
            }
            Err(e) => {
                error!("Scheduled refresh failed: {}", e);
            }
        }
    }
}

/// Resolves when `signal` fires.
///
/// If the signal cannot be listened for, the error is logged and the
/// returned future never resolves.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Cannot listen for shutdown signal, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
}
