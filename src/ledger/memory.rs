use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::models::{NewTransaction, Payment, SellerBalance, Transaction, TransactionStatus};
use super::store::{IngestInsert, SettlementStore};
use crate::error::{AppResult, LedgerError};

#[derive(Default)]
struct MemoryState {
    transactions: HashMap<Uuid, Transaction>,
    intent_index: HashMap<String, Uuid>,
    payments: HashMap<Uuid, Payment>,
    balances: HashMap<Uuid, SellerBalance>,
    /// Transaction ids whose pending credit has been applied
    credited: HashSet<Uuid>,
}

/// In-memory settlement store used by tests and local development.
///
/// A single write lock makes every mutation an atomic unit, which is
/// strictly stronger than the per-seller serialization the Postgres
/// repository provides.
pub struct MemoryLedger {
    state: tokio::sync::RwLock<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: tokio::sync::RwLock::new(MemoryState::default()),
        }
    }

    /// Seed a transaction directly, bypassing ingestion. Test support
    /// for scenarios that need rows with historical timestamps.
    pub async fn insert_transaction(&self, transaction: Transaction) {
        let mut state = self.state.write().await;
        state
            .intent_index
            .insert(transaction.payment_intent_id.clone(), transaction.id);
        state.transactions.insert(transaction.id, transaction);
    }

    /// Seed a local payment record, as the checkout flow would.
    pub async fn insert_payment(&self, payment: Payment) {
        let mut state = self.state.write().await;
        state.payments.insert(payment.id, payment);
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_credit(state: &mut MemoryState, seller_id: Uuid, amount_cents: i64, transaction_id: Uuid) {
    if !state.credited.insert(transaction_id) {
        // Credit already applied for this transaction
        return;
    }
    let balance = state
        .balances
        .entry(seller_id)
        .or_insert_with(|| SellerBalance::empty(seller_id));
    balance.pending_cents += amount_cents;
    balance.updated_at = Utc::now();
}

#[async_trait]
impl SettlementStore for MemoryLedger {
    async fn find_transaction_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> AppResult<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .intent_index
            .get(payment_intent_id)
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn create_transaction_with_credit(
        &self,
        new_tx: NewTransaction,
    ) -> AppResult<IngestInsert> {
        let mut state = self.state.write().await;

        if let Some(existing_id) = state.intent_index.get(&new_tx.payment_intent_id) {
            let existing = state.transactions[existing_id].clone();
            return Ok(IngestInsert::AlreadyExists(existing));
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            order_id: new_tx.order_id,
            seller_id: new_tx.seller_id,
            payment_intent_id: new_tx.payment_intent_id.clone(),
            gross_amount_cents: new_tx.gross_amount_cents,
            status: TransactionStatus::Succeeded,
            created_at: Utc::now(),
        };

        state
            .intent_index
            .insert(new_tx.payment_intent_id.clone(), transaction.id);
        state.transactions.insert(transaction.id, transaction.clone());
        apply_credit(
            &mut state,
            new_tx.seller_id,
            new_tx.net_credit_cents,
            transaction.id,
        );

        // Attach any pre-existing local payment record for this intent
        let transaction_id = transaction.id;
        for payment in state.payments.values_mut() {
            if payment.payment_intent_id.as_deref() == Some(new_tx.payment_intent_id.as_str())
                && payment.transaction_id.is_none()
            {
                payment.transaction_id = Some(transaction_id);
            }
        }

        Ok(IngestInsert::Created(transaction))
    }

    async fn credit_pending(
        &self,
        seller_id: Uuid,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> AppResult<()> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidTransferAmount { amount_cents }.into());
        }
        let mut state = self.state.write().await;
        apply_credit(&mut state, seller_id, amount_cents, transaction_id);
        Ok(())
    }

    async fn move_pending_to_available(
        &self,
        seller_id: Uuid,
        amount_cents: i64,
    ) -> AppResult<()> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidTransferAmount { amount_cents }.into());
        }
        let mut state = self.state.write().await;
        let balance = state
            .balances
            .entry(seller_id)
            .or_insert_with(|| SellerBalance::empty(seller_id));

        if balance.pending_cents < amount_cents {
            return Err(LedgerError::InsufficientPendingBalance {
                seller_id,
                requested_cents: amount_cents,
                pending_cents: balance.pending_cents,
            }
            .into());
        }

        balance.pending_cents -= amount_cents;
        balance.available_cents += amount_cents;
        balance.updated_at = Utc::now();
        Ok(())
    }

    async fn get_balance(&self, seller_id: Uuid) -> AppResult<SellerBalance> {
        let state = self.state.read().await;
        Ok(state
            .balances
            .get(&seller_id)
            .cloned()
            .unwrap_or_else(|| SellerBalance::empty(seller_id)))
    }

    async fn sellers_with_matured_transactions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut sellers: Vec<Uuid> = state
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Succeeded && t.created_at <= cutoff)
            .map(|t| t.seller_id)
            .collect();
        sellers.sort();
        sellers.dedup();
        Ok(sellers)
    }

    async fn payments_with_intents_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| {
                p.payment_intent_id.is_some() && p.created_at >= from && p.created_at <= to
            })
            .cloned()
            .collect())
    }
}
