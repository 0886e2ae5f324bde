// Settlement Scheduler - fires the daily pending -> available sweep.
//
// Runs at a configured UTC hour (off-peak by default). Overlapping
// runs are safe: a second pass finds zero pending and is a no-op, and
// the store serializes per-seller transfers.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info};

use super::pass::SettlementService;

/// Daily schedule configuration
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// UTC hour to execute (0-23)
    pub execution_hour: u32,
    /// How long a succeeded transaction stays pending
    pub maturity_window: ChronoDuration,
}

pub struct SettlementScheduler {
    config: ScheduleConfig,
    service: Arc<SettlementService>,
}

impl SettlementScheduler {
    pub fn new(config: ScheduleConfig, service: Arc<SettlementService>) -> Self {
        Self { config, service }
    }

    /// Start the scheduler (runs in background)
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
                        "⏰ Next settlement pass scheduled for: {} UTC",
                        next_execution.format("%H:%M:%S")
                    );
                    tokio::time::sleep(Duration::from_secs(
                        duration_until_execution.num_seconds() as u64,
                    ))
                    .await;
                }

                match service
                    .run_settlement_pass(config.maturity_window, Utc::now())
                    .await
                {
                    Ok(summary) => info!(
                        total_moved_cents = summary.total_moved_cents,
                        sellers_processed = summary.sellers_processed,
                        "✓ Scheduled settlement pass completed"
                    ),
                    Err(e) => error!("❌ Scheduled settlement pass failed: {:?}", e),
                }
            }
        })
    }
}

/// Calculate the next daily execution time
pub(crate) fn calculate_next_daily_execution(
    now: DateTime<Utc>,
    execution_hour: u32,
) -> DateTime<Utc> {
    let today = now
        .date_naive()
        .and_hms_opt(execution_hour, 0, 0)
        .unwrap_or_else(|| now.date_naive().and_hms_opt(0, 0, 0).unwrap());
    let today_dt = Utc.from_utc_datetime(&today);

    // If execution time has passed today, schedule for tomorrow
    if today_dt <= now {
        let tomorrow = (now.date_naive() + ChronoDuration::days(1))
            .and_hms_opt(execution_hour, 0, 0)
            .unwrap_or_else(|| now.date_naive().and_hms_opt(0, 0, 0).unwrap());
        Utc.from_utc_datetime(&tomorrow)
    } else {
        today_dt
    }
}
