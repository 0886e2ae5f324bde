pub mod pass;
pub mod scheduler;

pub use pass::{SettlementService, SettlementSummary};
pub use scheduler::{ScheduleConfig, SettlementScheduler};
