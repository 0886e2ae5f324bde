pub mod engine;
pub mod report;
pub mod scheduler;

pub use engine::ReconciliationService;
pub use report::{AmountMismatch, MissingTransaction, OrphanedPayment, ReconciliationReport};
pub use scheduler::{ReconcileScheduleConfig, ReconciliationScheduler};
