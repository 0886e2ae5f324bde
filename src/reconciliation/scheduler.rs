// Reconciliation Scheduler - fires the daily audit against the
// gateway, windowed to a bounded lookback so gateway query cost and
// alert latency stay predictable.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info};

use super::engine::ReconciliationService;
use crate::settlement::scheduler::calculate_next_daily_execution;

#[derive(Debug, Clone)]
pub struct ReconcileScheduleConfig {
    /// UTC hour to execute (0-23)
    pub execution_hour: u32,
    /// How far back each pass audits
    pub lookback: ChronoDuration,
}

pub struct ReconciliationScheduler {
    config: ReconcileScheduleConfig,
    service: Arc<ReconciliationService>,
}

impl ReconciliationScheduler {
    pub fn new(config: ReconcileScheduleConfig, service: Arc<ReconciliationService>) -> Self {
        Self { config, service }
    }

    /// Start the scheduler (runs in background). A failed pass is
    /// logged and retried naturally on the next scheduled run.
    pub fn start(&self) -> JoinHandle<()> {
        let config = self.config.clone();
        let service = self.service.clone();

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next_execution = calculate_next_daily_execution(now, config.execution_hour);
                let duration_until_execution = next_execution.signed_duration_since(now);

                if duration_until_execution.num_seconds() > 0 {
                    info!(
                        "⏰ Next reconciliation pass scheduled for: {} UTC",
                        next_execution.format("%H:%M:%S")
                    );
                    tokio::time::sleep(Duration::from_secs(
                        duration_until_execution.num_seconds() as u64,
                    ))
                    .await;
                }

                let to = Utc::now();
                let from = to - config.lookback;
                match service.run_reconciliation_pass(from, to).await {
                    Ok(report) => info!(
                        gateway_records = report.gateway_records,
                        missing = report.missing_transactions.len(),
                        mismatched = report.mismatched_amounts.len(),
                        orphaned = report.orphaned_payments.len(),
                        "✓ Scheduled reconciliation pass completed"
                    ),
                    Err(e) => error!("❌ Scheduled reconciliation pass failed: {:?}", e),
                }
            }
        })
    }
}
