use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Transaction status enum
///
/// Set once at creation; corrections create compensating records
/// rather than mutating an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Succeeded => write!(f, "succeeded"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One settled marketplace payment, created on first sighting of a
/// succeeded gateway event. At most one row per gateway payment intent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: i64,
    pub seller_id: Uuid,
    pub payment_intent_id: String,
    pub gross_amount_cents: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields for a transaction about to be recorded, together with the
/// net credit the seller earns once it lands.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_id: i64,
    pub seller_id: Uuid,
    pub payment_intent_id: String,
    pub gross_amount_cents: i64,
    pub net_credit_cents: i64,
}

/// Local record of a payment attempt; may predate settlement and may
/// never match a transaction (that is what reconciliation flags).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub payment_intent_id: Option<String>,
    pub amount_cents: i64,
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Per-seller ledger head. Both balances are non-negative; funds only
/// move pending -> available, never the other way.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SellerBalance {
    pub seller_id: Uuid,
    pub pending_cents: i64,
    pub available_cents: i64,
    pub updated_at: DateTime<Utc>,
}

impl SellerBalance {
    /// Zero balance for a seller with no ledger row yet
    pub fn empty(seller_id: Uuid) -> Self {
        Self {
            seller_id,
            pending_cents: 0,
            available_cents: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn total_cents(&self) -> i64 {
        self.pending_cents + self.available_cents
    }
}
