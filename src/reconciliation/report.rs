use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A gateway-succeeded payment with no local transaction.
///
/// Repair is attempted via re-ingestion; when the gateway metadata
/// carries no recoverable order reference the entry stays unrepaired.
#[derive(Debug, Clone, Serialize)]
pub struct MissingTransaction {
    pub payment_intent_id: String,
    pub gateway_amount_cents: i64,
    pub order_id: Option<i64>,
    pub repaired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair_error: Option<String>,
}

/// Local and gateway amounts disagree for the same payment intent.
/// Classification only - amount correction is a manual review action.
#[derive(Debug, Clone, Serialize)]
pub struct AmountMismatch {
    pub payment_intent_id: String,
    pub local_amount_cents: i64,
    pub gateway_amount_cents: i64,
    /// gateway - local, signed
    pub difference_cents: i64,
}

/// A local payment referencing a gateway intent the gateway did not
/// report inside the audited window.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanedPayment {
    pub payment_id: Uuid,
    pub payment_intent_id: String,
    pub amount_cents: i64,
}

/// Summary of one reconciliation pass. Ephemeral: produced, logged,
/// returned to the caller, and discarded.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub window_from: DateTime<Utc>,
    pub window_to: DateTime<Utc>,
    pub gateway_records: u64,
    pub missing_transactions: Vec<MissingTransaction>,
    pub mismatched_amounts: Vec<AmountMismatch>,
    pub orphaned_payments: Vec<OrphanedPayment>,
}

impl ReconciliationReport {
    pub fn new(window_from: DateTime<Utc>, window_to: DateTime<Utc>) -> Self {
        Self {
            window_from,
            window_to,
            gateway_records: 0,
            missing_transactions: Vec::new(),
            mismatched_amounts: Vec::new(),
            orphaned_payments: Vec::new(),
        }
    }

    pub fn has_discrepancies(&self) -> bool {
        !self.missing_transactions.is_empty()
            || !self.mismatched_amounts.is_empty()
            || !self.orphaned_payments.is_empty()
    }
}
