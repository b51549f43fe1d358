//! Periodic pipeline trigger

use super::pipeline::{PipelineDriver, RunRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Scheduler {
    driver: Arc<PipelineDriver>,
    request: RunRequest,
    period: Duration,
    last_error: Arc<RwLock<Option<String>>>,
}

impl Scheduler {
    pub fn new(
        driver: Arc<PipelineDriver>,
        request: RunRequest,
        period: Duration,
        last_error: Arc<RwLock<Option<String>>>,
    ) -> Self {
        Self {
            driver,
            request,
            period,
            last_error,
        }
    }

    /// Run the pipeline every period until `cancel` fires
    ///
    /// With `run_immediately` the first run starts right away (an empty
    /// database); otherwise it waits one full period.
    pub fn spawn(self, run_immediately: bool, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = if run_immediately {
                tokio::time::Instant::now()
            } else {
                tokio::time::Instant::now() + self.period
            };
            let mut ticker = tokio::time::interval_at(start, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                period_secs = self.period.as_secs(),
                run_immediately,
                "Scheduler started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let stats = tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("Scheduler stopped during run");
                                break;
                            }
                            stats = self.driver.run(&self.request) => stats,
                        };

                        if let Some(summary) = stats.error_summary() {
                            warn!(summary = %summary, "Scheduled run had failures");
                            *self.last_error.write().await = Some(summary);
                        }
                    }
                }
            }
        })
    }
}
