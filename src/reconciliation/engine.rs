// Reconciliation Engine - periodic audit of local settlement records
// against the gateway's authoritative payment list.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::report::{AmountMismatch, MissingTransaction, OrphanedPayment, ReconciliationReport};
use crate::error::AppResult;
use crate::gateway::{GatewayPaymentRecord, PaymentGatewayClient};
use crate::ingestion::{PaymentEvent, PaymentIngestionService};
use crate::ledger::SettlementStore;

pub struct ReconciliationService {
    gateway: Arc<dyn PaymentGatewayClient>,
    store: Arc<dyn SettlementStore>,
    ingestion: Arc<PaymentIngestionService>,
}

impl ReconciliationService {
    pub fn new(
        gateway: Arc<dyn PaymentGatewayClient>,
        store: Arc<dyn SettlementStore>,
        ingestion: Arc<PaymentIngestionService>,
    ) -> Self {
        Self {
            gateway,
            store,
            ingestion,
        }
    }

    /// Run one reconciliation pass over `[from, to]`.
    ///
    /// A gateway fetch failure aborts the whole pass: auditing against
    /// an incomplete authoritative set would misclassify local records.
    /// Per-record repair failures are isolated and recorded in the
    /// report instead.
    pub async fn run_reconciliation_pass(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<ReconciliationReport> {
        info!(%from, %to, "🔍 Starting reconciliation pass");

        let records = self.gateway.list_payments(from, to).await?;
        let fetched_intents: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();

        let mut report = ReconciliationReport::new(from, to);
        report.gateway_records = records.len() as u64;

        for record in records.iter().filter(|r| r.is_succeeded()) {
            match self.store.find_transaction_by_intent(&record.id).await? {
                None => {
                    report
                        .missing_transactions
                        .push(self.repair_missing(record).await);
                }
                Some(local) => {
                    if local.gross_amount_cents != record.attributes.amount {
                        warn!(
                            payment_intent_id = %record.id,
                            local_amount_cents = local.gross_amount_cents,
                            gateway_amount_cents = record.attributes.amount,
                            "Amount mismatch between local transaction and gateway"
                        );
                        report.mismatched_amounts.push(AmountMismatch {
                            payment_intent_id: record.id.clone(),
                            local_amount_cents: local.gross_amount_cents,
                            gateway_amount_cents: record.attributes.amount,
                            difference_cents: record.attributes.amount
                                - local.gross_amount_cents,
                        });
                    }
                }
            }
        }

        let local_payments = self.store.payments_with_intents_in_window(from, to).await?;
        for payment in local_payments {
            let Some(intent) = payment.payment_intent_id.clone() else {
                continue;
            };
            if !fetched_intents.contains(intent.as_str()) {
                report.orphaned_payments.push(OrphanedPayment {
                    payment_id: payment.id,
                    payment_intent_id: intent,
                    amount_cents: payment.amount_cents,
                });
            }
        }

        self.emit_alerts(&report);
        Ok(report)
    }

    /// Attempt to repair a missing transaction by re-ingesting a
    /// synthesized event from the gateway record.
    async fn repair_missing(&self, record: &GatewayPaymentRecord) -> MissingTransaction {
        let event = PaymentEvent::from_gateway_record(record);

        if event.order_id.is_none() {
            warn!(
                payment_intent_id = %record.id,
                "Missing transaction cannot be repaired: no order reference in gateway metadata"
            );
            return MissingTransaction {
                payment_intent_id: record.id.clone(),
                gateway_amount_cents: record.attributes.amount,
                order_id: None,
                repaired: false,
                repair_error: Some("no order reference in gateway metadata".to_string()),
            };
        }

        match self.ingestion.ingest(&event).await {
            Ok(outcome) => {
                info!(
                    payment_intent_id = %record.id,
                    transaction_id = %outcome.transaction.id,
                    created = outcome.created,
                    "✓ Missing transaction repaired"
                );
                MissingTransaction {
                    payment_intent_id: record.id.clone(),
                    gateway_amount_cents: record.attributes.amount,
                    order_id: event.order_id,
                    repaired: true,
                    repair_error: None,
                }
            }
            Err(e) => {
                warn!(
                    payment_intent_id = %record.id,
                    error = %e,
                    "Failed to repair missing transaction"
                );
                MissingTransaction {
                    payment_intent_id: record.id.clone(),
                    gateway_amount_cents: record.attributes.amount,
                    order_id: event.order_id,
                    repaired: false,
                    repair_error: Some(e.to_string()),
                }
            }
        }
    }

    fn emit_alerts(&self, report: &ReconciliationReport) {
        if !report.has_discrepancies() {
            info!(
                gateway_records = report.gateway_records,
                "✓ Reconciliation pass completed, no discrepancies"
            );
            return;
        }

        error!(
            missing = report.missing_transactions.len(),
            mismatched = report.mismatched_amounts.len(),
            orphaned = report.orphaned_payments.len(),
            gateway_records = report.gateway_records,
            "🚨 Reconciliation discrepancies detected"
        );

        for missing in &report.missing_transactions {
            warn!(
                payment_intent_id = %missing.payment_intent_id,
                gateway_amount_cents = missing.gateway_amount_cents,
                repaired = missing.repaired,
                repair_error = ?missing.repair_error,
                "Discrepancy: missing transaction"
            );
        }
        for mismatch in &report.mismatched_amounts {
            warn!(
                payment_intent_id = %mismatch.payment_intent_id,
                local_amount_cents = mismatch.local_amount_cents,
                gateway_amount_cents = mismatch.gateway_amount_cents,
                difference_cents = mismatch.difference_cents,
                "Discrepancy: amount mismatch, manual review required"
            );
        }
        for orphan in &report.orphaned_payments {
            warn!(
                payment_id = %orphan.payment_id,
                payment_intent_id = %orphan.payment_intent_id,
                amount_cents = orphan.amount_cents,
                "Discrepancy: orphaned local payment"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::FeeConfig;
    use crate::error::{AppError, ReconcileError};
    use crate::gateway::{GatewayMetadata, GatewayPaymentAttributes};
    use crate::ledger::models::{Payment, Transaction, TransactionStatus};
    use crate::ledger::MemoryLedger;
    use crate::orders::MemoryOrderDirectory;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct ScriptedGateway {
        records: Vec<GatewayPaymentRecord>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentGatewayClient for ScriptedGateway {
        async fn list_payments(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> AppResult<Vec<GatewayPaymentRecord>> {
            if self.fail {
                return Err(
                    ReconcileError::GatewayFetchFailed("gateway returned 500".to_string()).into(),
                );
            }
            Ok(self.records.clone())
        }
    }

    fn gateway_record(intent: &str, status: &str, amount: i64, order_id: Option<&str>) -> GatewayPaymentRecord {
        GatewayPaymentRecord {
            id: intent.to_string(),
            attributes: GatewayPaymentAttributes {
                status: status.to_string(),
                amount,
                created_at: Utc::now() - chrono::Duration::hours(12),
                metadata: GatewayMetadata {
                    order_id: order_id.map(|s| s.to_string()),
                },
            },
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - chrono::Duration::hours(48), now)
    }

    async fn build_service(
        records: Vec<GatewayPaymentRecord>,
        fail: bool,
    ) -> (
        ReconciliationService,
        Arc<MemoryLedger>,
        Arc<MemoryOrderDirectory>,
    ) {
        let ledger = Arc::new(MemoryLedger::new());
        let orders = Arc::new(MemoryOrderDirectory::new());
        let ingestion = Arc::new(PaymentIngestionService::new(
            ledger.clone(),
            orders.clone(),
        ));
        let gateway = Arc::new(ScriptedGateway { records, fail });
        let service = ReconciliationService::new(gateway, ledger.clone(), ingestion);
        (service, ledger, orders)
    }

    #[tokio::test]
    async fn test_missing_transaction_is_repaired_by_reingestion() {
        let records = vec![gateway_record("pi_123", "succeeded", 2000, Some("42"))];
        let (service, ledger, orders) = build_service(records, false).await;
        let seller = Uuid::new_v4();
        orders
            .insert_order(42, seller, FeeConfig::new(0.10).unwrap())
            .await;

        let (from, to) = window();
        let report = service.run_reconciliation_pass(from, to).await.unwrap();

        assert_eq!(report.missing_transactions.len(), 1);
        let missing = &report.missing_transactions[0];
        assert_eq!(missing.payment_intent_id, "pi_123");
        assert!(missing.repaired);

        let transaction = ledger
            .find_transaction_by_intent("pi_123")
            .await
            .unwrap()
            .expect("transaction must exist after repair");
        assert_eq!(transaction.gross_amount_cents, 2000);

        // net credit of 2000 at 10% commission
        let balance = ledger.get_balance(seller).await.unwrap();
        assert_eq!(balance.pending_cents, 1800);
    }

    #[tokio::test]
    async fn test_missing_without_order_metadata_is_logged_and_skipped() {
        let records = vec![gateway_record("pi_norder", "succeeded", 900, None)];
        let (service, ledger, _orders) = build_service(records, false).await;

        let (from, to) = window();
        let report = service.run_reconciliation_pass(from, to).await.unwrap();

        assert_eq!(report.missing_transactions.len(), 1);
        let missing = &report.missing_transactions[0];
        assert!(!missing.repaired);
        assert!(missing.repair_error.is_some());
        assert_eq!(ledger.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_amount_mismatch_is_classified_without_mutation() {
        let records = vec![gateway_record("pi_456", "succeeded", 1600, Some("42"))];
        let (service, ledger, _orders) = build_service(records, false).await;

        let seller = Uuid::new_v4();
        ledger
            .insert_transaction(Transaction {
                id: Uuid::new_v4(),
                order_id: 42,
                seller_id: seller,
                payment_intent_id: "pi_456".to_string(),
                gross_amount_cents: 1500,
                status: TransactionStatus::Succeeded,
                created_at: Utc::now() - chrono::Duration::hours(10),
            })
            .await;

        let (from, to) = window();
        let report = service.run_reconciliation_pass(from, to).await.unwrap();

        assert_eq!(report.mismatched_amounts.len(), 1);
        let mismatch = &report.mismatched_amounts[0];
        assert_eq!(mismatch.local_amount_cents, 1500);
        assert_eq!(mismatch.gateway_amount_cents, 1600);
        assert_eq!(mismatch.difference_cents, 100);

        // No balance mutation for a mismatch
        let balance = ledger.get_balance(seller).await.unwrap();
        assert_eq!(balance.pending_cents, 0);
        assert_eq!(balance.available_cents, 0);
    }

    #[tokio::test]
    async fn test_orphaned_local_payment_is_flagged() {
        let (service, ledger, _orders) = build_service(vec![], false).await;

        let payment_id = Uuid::new_v4();
        ledger
            .insert_payment(Payment {
                id: payment_id,
                payment_intent_id: Some("pi_789".to_string()),
                amount_cents: 1200,
                transaction_id: None,
                created_at: Utc::now() - chrono::Duration::hours(6),
            })
            .await;

        let (from, to) = window();
        let report = service.run_reconciliation_pass(from, to).await.unwrap();

        assert_eq!(report.orphaned_payments.len(), 1);
        let orphan = &report.orphaned_payments[0];
        assert_eq!(orphan.payment_id, payment_id);
        assert_eq!(orphan.payment_intent_id, "pi_789");
    }

    #[tokio::test]
    async fn test_gateway_fetch_failure_aborts_the_pass() {
        let (service, ledger, _orders) = build_service(vec![], true).await;
        ledger
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                payment_intent_id: Some("pi_untouched".to_string()),
                amount_cents: 100,
                transaction_id: None,
                created_at: Utc::now(),
            })
            .await;

        let (from, to) = window();
        let err = service.run_reconciliation_pass(from, to).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Reconcile(ReconcileError::GatewayFetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_repair_failure_is_isolated_per_record() {
        // pi_a repairs cleanly; pi_b points at an order without a
        // seller line and must not abort the pass.
        let records = vec![
            gateway_record("pi_a", "succeeded", 1000, Some("1")),
            gateway_record("pi_b", "succeeded", 2000, Some("2")),
        ];
        let (service, ledger, orders) = build_service(records, false).await;
        let seller = Uuid::new_v4();
        orders
            .insert_order(1, seller, FeeConfig::new(0.10).unwrap())
            .await;
        orders.insert_unattributed_order(2).await;

        let (from, to) = window();
        let report = service.run_reconciliation_pass(from, to).await.unwrap();

        assert_eq!(report.missing_transactions.len(), 2);
        let repaired: Vec<bool> = report
            .missing_transactions
            .iter()
            .map(|m| m.repaired)
            .collect();
        assert!(repaired.contains(&true));
        assert!(repaired.contains(&false));
        assert_eq!(ledger.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_non_succeeded_gateway_records_are_ignored() {
        let records = vec![gateway_record("pi_fail", "failed", 700, Some("42"))];
        let (service, ledger, _orders) = build_service(records, false).await;

        let (from, to) = window();
        let report = service.run_reconciliation_pass(from, to).await.unwrap();

        assert!(report.missing_transactions.is_empty());
        assert_eq!(ledger.transaction_count().await, 0);
    }
}
