// Settlement pass - the pending -> available sweep for matured funds.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::ledger::SettlementStore;

/// Summary of one settlement pass
#[derive(Debug, Clone, Serialize)]
pub struct SettlementSummary {
    pub total_moved_cents: i64,
    pub sellers_processed: u64,
    pub sellers_failed: u64,
}

pub struct SettlementService {
    store: Arc<dyn SettlementStore>,
}

impl SettlementService {
    pub fn new(store: Arc<dyn SettlementStore>) -> Self {
        Self { store }
    }

    /// Run one settlement pass: for every seller with a succeeded
    /// transaction older than the maturity window, move that seller's
    /// pending balance into available.
    ///
    /// This is a batch sweep, not a per-transaction transfer: each
    /// qualifying seller gets exactly one transfer of their entire
    /// current pending balance, regardless of how many transactions
    /// matured. Pending credit that lands between selection and
    /// transfer moves early; the next pass matures anything left over.
    /// One seller's failure is logged and does not abort the pass.
    pub async fn run_settlement_pass(
        &self,
        maturity_window: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<SettlementSummary> {
        let cutoff = now - maturity_window;
        info!(%cutoff, "🔄 Starting settlement pass");

        let sellers = self.store.sellers_with_matured_transactions(cutoff).await?;
        info!(sellers = sellers.len(), "Sellers with matured transactions");

        let mut summary = SettlementSummary {
            total_moved_cents: 0,
            sellers_processed: 0,
            sellers_failed: 0,
        };

        for seller_id in sellers {
            let balance = match self.store.get_balance(seller_id).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(%seller_id, error = %e, "Failed to read balance, skipping seller");
                    summary.sellers_failed += 1;
                    continue;
                }
            };

            if balance.pending_cents <= 0 {
                // Already drained, e.g. by an overlapping pass
                continue;
            }

            match self
                .store
                .move_pending_to_available(seller_id, balance.pending_cents)
                .await
            {
                Ok(()) => {
                    info!(
                        %seller_id,
                        moved_cents = balance.pending_cents,
                        "✓ Pending balance settled"
                    );
                    summary.total_moved_cents += balance.pending_cents;
                    summary.sellers_processed += 1;
                }
                Err(e) => {
                    warn!(
                        %seller_id,
                        requested_cents = balance.pending_cents,
                        error = %e,
                        "Settlement transfer failed for seller"
                    );
                    summary.sellers_failed += 1;
                }
            }
        }

        info!(
            total_moved_cents = summary.total_moved_cents,
            sellers_processed = summary.sellers_processed,
            sellers_failed = summary.sellers_failed,
            "✓ Settlement pass completed"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, LedgerError};
    use crate::ledger::models::{
        NewTransaction, Payment, SellerBalance, Transaction, TransactionStatus,
    };
    use crate::ledger::{IngestInsert, MemoryLedger};
    use async_trait::async_trait;
    use uuid::Uuid;

    fn matured_transaction(seller_id: Uuid, intent: &str, gross: i64, days_old: i64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            order_id: 1,
            seller_id,
            payment_intent_id: intent.to_string(),
            gross_amount_cents: gross,
            status: TransactionStatus::Succeeded,
            created_at: Utc::now() - Duration::days(days_old),
        }
    }

    #[tokio::test]
    async fn test_pass_moves_full_pending_for_matured_seller() {
        let ledger = Arc::new(MemoryLedger::new());
        let seller = Uuid::new_v4();

        // Three succeeded transactions from 10 days ago, 5000 cents pending total
        for (i, amount) in [2000_i64, 2000, 1000].iter().enumerate() {
            let tx = matured_transaction(seller, &format!("pi_{}", i), *amount, 10);
            ledger
                .credit_pending(seller, *amount, tx.id)
                .await
                .unwrap();
            ledger.insert_transaction(tx).await;
        }

        let service = SettlementService::new(ledger.clone());
        let summary = service
            .run_settlement_pass(Duration::days(7), Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.total_moved_cents, 5000);
        assert_eq!(summary.sellers_processed, 1);
        assert_eq!(summary.sellers_failed, 0);

        let balance = ledger.get_balance(seller).await.unwrap();
        assert_eq!(balance.pending_cents, 0);
        assert_eq!(balance.available_cents, 5000);
        // Settlement only moves funds between buckets
        assert_eq!(balance.total_cents(), 5000);
    }

    #[tokio::test]
    async fn test_immature_transactions_stay_pending() {
        let ledger = Arc::new(MemoryLedger::new());
        let seller = Uuid::new_v4();

        let tx = matured_transaction(seller, "pi_young", 3000, 2);
        ledger.credit_pending(seller, 3000, tx.id).await.unwrap();
        ledger.insert_transaction(tx).await;

        let service = SettlementService::new(ledger.clone());
        let summary = service
            .run_settlement_pass(Duration::days(7), Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.total_moved_cents, 0);
        assert_eq!(summary.sellers_processed, 0);

        let balance = ledger.get_balance(seller).await.unwrap();
        assert_eq!(balance.pending_cents, 3000);
        assert_eq!(balance.available_cents, 0);
    }

    #[tokio::test]
    async fn test_overlapping_pass_finds_nothing_to_move() {
        let ledger = Arc::new(MemoryLedger::new());
        let seller = Uuid::new_v4();

        let tx = matured_transaction(seller, "pi_old", 1500, 10);
        ledger.credit_pending(seller, 1500, tx.id).await.unwrap();
        ledger.insert_transaction(tx).await;

        let service = SettlementService::new(ledger.clone());
        let first = service
            .run_settlement_pass(Duration::days(7), Utc::now())
            .await
            .unwrap();
        let second = service
            .run_settlement_pass(Duration::days(7), Utc::now())
            .await
            .unwrap();

        assert_eq!(first.total_moved_cents, 1500);
        assert_eq!(second.total_moved_cents, 0);
        assert_eq!(second.sellers_failed, 0);

        let balance = ledger.get_balance(seller).await.unwrap();
        assert_eq!(balance.available_cents, 1500);
    }

    /// Store wrapper that fails transfers for one seller, standing in
    /// for a concurrent drain.
    struct FailingTransferStore {
        inner: Arc<MemoryLedger>,
        fail_seller: Uuid,
    }

    #[async_trait]
    impl crate::ledger::SettlementStore for FailingTransferStore {
        async fn find_transaction_by_intent(
            &self,
            payment_intent_id: &str,
        ) -> AppResult<Option<Transaction>> {
            self.inner.find_transaction_by_intent(payment_intent_id).await
        }

        async fn create_transaction_with_credit(
            &self,
            new_tx: NewTransaction,
        ) -> AppResult<IngestInsert> {
            self.inner.create_transaction_with_credit(new_tx).await
        }

        async fn credit_pending(
            &self,
            seller_id: Uuid,
            amount_cents: i64,
            transaction_id: Uuid,
        ) -> AppResult<()> {
            self.inner
                .credit_pending(seller_id, amount_cents, transaction_id)
                .await
        }

        async fn move_pending_to_available(
            &self,
            seller_id: Uuid,
            amount_cents: i64,
        ) -> AppResult<()> {
            if seller_id == self.fail_seller {
                return Err(AppError::Ledger(LedgerError::InsufficientPendingBalance {
                    seller_id,
                    requested_cents: amount_cents,
                    pending_cents: 0,
                }));
            }
            self.inner
                .move_pending_to_available(seller_id, amount_cents)
                .await
        }

        async fn get_balance(&self, seller_id: Uuid) -> AppResult<SellerBalance> {
            self.inner.get_balance(seller_id).await
        }

        async fn sellers_with_matured_transactions(
            &self,
            cutoff: DateTime<Utc>,
        ) -> AppResult<Vec<Uuid>> {
            self.inner.sellers_with_matured_transactions(cutoff).await
        }

        async fn payments_with_intents_in_window(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> AppResult<Vec<Payment>> {
            self.inner.payments_with_intents_in_window(from, to).await
        }
    }

    #[tokio::test]
    async fn test_one_seller_failure_does_not_abort_the_pass() {
        let ledger = Arc::new(MemoryLedger::new());
        let healthy = Uuid::new_v4();
        let broken = Uuid::new_v4();

        for (seller, intent, amount) in
            [(healthy, "pi_ok", 4000_i64), (broken, "pi_fail", 2500)]
        {
            let tx = matured_transaction(seller, intent, amount, 10);
            ledger.credit_pending(seller, amount, tx.id).await.unwrap();
            ledger.insert_transaction(tx).await;
        }

        let store = Arc::new(FailingTransferStore {
            inner: ledger.clone(),
            fail_seller: broken,
        });
        let service = SettlementService::new(store);
        let summary = service
            .run_settlement_pass(Duration::days(7), Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.total_moved_cents, 4000);
        assert_eq!(summary.sellers_processed, 1);
        assert_eq!(summary.sellers_failed, 1);

        let healthy_balance = ledger.get_balance(healthy).await.unwrap();
        assert_eq!(healthy_balance.available_cents, 4000);
    }
}
