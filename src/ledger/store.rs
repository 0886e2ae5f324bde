use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{NewTransaction, Payment, SellerBalance, Transaction};
use crate::error::AppResult;

/// Outcome of recording a transaction with its pending credit
#[derive(Debug, Clone)]
pub enum IngestInsert {
    /// Row inserted and pending balance credited
    Created(Transaction),
    /// A transaction for this payment intent already existed; nothing changed
    AlreadyExists(Transaction),
}

/// Storage seam behind ingestion, settlement and reconciliation.
///
/// Implemented by the Postgres repository in production and by the
/// in-memory store in tests and local development. All balance
/// mutations are scoped per seller: concurrent transfers on different
/// sellers proceed independently, transfers on the same seller
/// serialize.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn find_transaction_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> AppResult<Option<Transaction>>;

    /// Insert a transaction and credit the seller's pending balance as
    /// one atomic unit. The uniqueness of `payment_intent_id` is
    /// enforced here: a concurrent duplicate resolves to
    /// `AlreadyExists` instead of a double credit.
    async fn create_transaction_with_credit(
        &self,
        new_tx: NewTransaction,
    ) -> AppResult<IngestInsert>;

    /// Credit a seller's pending balance, idempotent per
    /// `transaction_id`: an already-applied credit is a no-op.
    async fn credit_pending(
        &self,
        seller_id: Uuid,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> AppResult<()>;

    /// Atomically move `amount_cents` from pending to available for
    /// one seller. Fails with `InsufficientPendingBalance` and leaves
    /// both balances untouched if pending is too low.
    async fn move_pending_to_available(
        &self,
        seller_id: Uuid,
        amount_cents: i64,
    ) -> AppResult<()>;

    /// Ledger head for a seller; a seller without a row reads as zero.
    async fn get_balance(&self, seller_id: Uuid) -> AppResult<SellerBalance>;

    /// Distinct sellers owning at least one succeeded transaction
    /// created at or before `cutoff`.
    async fn sellers_with_matured_transactions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>>;

    /// Local payments carrying a gateway intent id, created inside the
    /// window. Used for the orphan check during reconciliation.
    async fn payments_with_intents_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Payment>>;
}
