use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use tracing::info;
use uuid::Uuid;

use super::models::{NewTransaction, Payment, SellerBalance, Transaction, TransactionStatus};
use super::store::{IngestInsert, SettlementStore};
use crate::error::{AppError, AppResult, LedgerError};

/// Postgres-backed settlement store - the source of truth in production.
///
/// Per-seller serialization comes from row-level locking on
/// `seller_balances`: every mutation is a single conditional UPDATE or
/// an upsert, so two writers on the same seller queue on the row lock
/// while different sellers proceed in parallel.
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply a pending credit inside an open database transaction.
    ///
    /// The `ledger_credits` row keyed by transaction id is the
    /// idempotency tag: if it already exists the balance upsert is
    /// skipped entirely.
    async fn credit_pending_in(
        tx: &mut PgTransaction<'_, Postgres>,
        seller_id: Uuid,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> AppResult<()> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidTransferAmount { amount_cents }.into());
        }

        let tagged = sqlx::query(
            r#"
            INSERT INTO ledger_credits (transaction_id, seller_id, amount_cents)
            VALUES ($1, $2, $3)
            ON CONFLICT (transaction_id) DO NOTHING
            "#,
        )
        .bind(transaction_id)
        .bind(seller_id)
        .bind(amount_cents)
        .execute(&mut **tx)
        .await?;

        if tagged.rows_affected() == 0 {
            // Credit already applied for this transaction
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO seller_balances (seller_id, pending_cents, available_cents, updated_at)
            VALUES ($1, $2, 0, now())
            ON CONFLICT (seller_id) DO UPDATE
            SET pending_cents = seller_balances.pending_cents + EXCLUDED.pending_cents,
                updated_at = now()
            "#,
        )
        .bind(seller_id)
        .bind(amount_cents)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SettlementStore for LedgerRepository {
    async fn find_transaction_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, order_id, seller_id, payment_intent_id, gross_amount_cents, status, created_at
            FROM transactions
            WHERE payment_intent_id = $1
            "#,
        )
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn create_transaction_with_credit(
        &self,
        new_tx: NewTransaction,
    ) -> AppResult<IngestInsert> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, order_id, seller_id, payment_intent_id, gross_amount_cents, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            ON CONFLICT (payment_intent_id) DO NOTHING
            RETURNING id, order_id, seller_id, payment_intent_id, gross_amount_cents, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_tx.order_id)
        .bind(new_tx.seller_id)
        .bind(&new_tx.payment_intent_id)
        .bind(new_tx.gross_amount_cents)
        .bind(TransactionStatus::Succeeded)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(transaction) = inserted else {
            // Lost the uniqueness race; surface the existing row
            tx.rollback().await?;
            let existing = self
                .find_transaction_by_intent(&new_tx.payment_intent_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "transaction for intent {} vanished after conflict",
                        new_tx.payment_intent_id
                    ))
                })?;
            return Ok(IngestInsert::AlreadyExists(existing));
        };

        Self::credit_pending_in(
            &mut tx,
            new_tx.seller_id,
            new_tx.net_credit_cents,
            transaction.id,
        )
        .await?;

        // Attach any pre-existing local payment record for this intent
        sqlx::query(
            r#"
            UPDATE payments
            SET transaction_id = $1
            WHERE payment_intent_id = $2 AND transaction_id IS NULL
            "#,
        )
        .bind(transaction.id)
        .bind(&new_tx.payment_intent_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            transaction_id = %transaction.id,
            seller_id = %new_tx.seller_id,
            payment_intent_id = %new_tx.payment_intent_id,
            net_credit_cents = new_tx.net_credit_cents,
            "✓ Transaction recorded and pending balance credited"
        );

        Ok(IngestInsert::Created(transaction))
    }

    async fn credit_pending(
        &self,
        seller_id: Uuid,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::credit_pending_in(&mut tx, seller_id, amount_cents, transaction_id).await?;
        tx.commit().await?;
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

        // Single conditional UPDATE: the guard and both mutations are
        // one indivisible statement, no partial application visible.
        let result = sqlx::query(
            r#"
            UPDATE seller_balances
            SET pending_cents = pending_cents - $2,
                available_cents = available_cents + $2,
                updated_at = now()
            WHERE seller_id = $1 AND pending_cents >= $2
            "#,
        )
        .bind(seller_id)
        .bind(amount_cents)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let balance = self.get_balance(seller_id).await?;
            return Err(LedgerError::InsufficientPendingBalance {
                seller_id,
                requested_cents: amount_cents,
                pending_cents: balance.pending_cents,
            }
            .into());
        }

        Ok(())
    }

    async fn get_balance(&self, seller_id: Uuid) -> AppResult<SellerBalance> {
        let balance = sqlx::query_as::<_, SellerBalance>(
            r#"
            SELECT seller_id, pending_cents, available_cents, updated_at
            FROM seller_balances
            WHERE seller_id = $1
            "#,
        )
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.unwrap_or_else(|| SellerBalance::empty(seller_id)))
    }

    async fn sellers_with_matured_transactions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let sellers = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT seller_id
            FROM transactions
            WHERE status = $1 AND created_at <= $2
            "#,
        )
        .bind(TransactionStatus::Succeeded)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(sellers)
    }

    async fn payments_with_intents_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, payment_intent_id, amount_cents, transaction_id, created_at
            FROM payments
            WHERE payment_intent_id IS NOT NULL
              AND created_at >= $1 AND created_at <= $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}
