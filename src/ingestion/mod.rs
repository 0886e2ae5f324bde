// Payment Ingestion Service - exactly-once consumption of gateway
// payment-succeeded events. Fed by the live webhook endpoint and by
// reconciliation repair.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::commission::compute_split;
use crate::error::{AppResult, IngestError};
use crate::gateway::GatewayPaymentRecord;
use crate::ledger::models::{NewTransaction, Transaction};
use crate::ledger::{IngestInsert, SettlementStore};
use crate::orders::{OrderDirectory, SellerResolution};

/// A gateway payment-succeeded event, normalized from either a webhook
/// delivery or a reconciliation-synthesized gateway record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub order_id: Option<i64>,
}

impl PaymentEvent {
    pub fn from_gateway_record(record: &GatewayPaymentRecord) -> Self {
        Self {
            payment_intent_id: record.id.clone(),
            amount_cents: record.attributes.amount,
            order_id: record.order_id(),
        }
    }
}

/// Result of one ingestion attempt
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// False when the event had already been ingested; the second
    /// delivery is a no-op and the balance is untouched.
    pub created: bool,
    pub transaction: Transaction,
}

pub struct PaymentIngestionService {
    store: Arc<dyn SettlementStore>,
    orders: Arc<dyn OrderDirectory>,
}

impl PaymentIngestionService {
    pub fn new(store: Arc<dyn SettlementStore>, orders: Arc<dyn OrderDirectory>) -> Self {
        Self { store, orders }
    }

    /// Ingest one payment-succeeded event.
    ///
    /// Transaction creation and the pending credit happen inside one
    /// atomic store operation, so a failed credit never leaves an
    /// orphan transaction behind.
    pub async fn ingest(&self, event: &PaymentEvent) -> AppResult<IngestOutcome> {
        if let Some(existing) = self
            .store
            .find_transaction_by_intent(&event.payment_intent_id)
            .await?
        {
            info!(
                payment_intent_id = %event.payment_intent_id,
                transaction_id = %existing.id,
                "Duplicate delivery, transaction already ingested"
            );
            return Ok(IngestOutcome {
                created: false,
                transaction: existing,
            });
        }

        let Some(order_id) = event.order_id else {
            return Err(IngestError::UnresolvedOrder {
                payment_intent_id: event.payment_intent_id.clone(),
            }
            .into());
        };

        let attribution = match self.orders.resolve_seller(order_id).await? {
            SellerResolution::Attributed(attribution) => attribution,
            SellerResolution::OrderNotFound => {
                return Err(IngestError::UnresolvedOrder {
                    payment_intent_id: event.payment_intent_id.clone(),
                }
                .into());
            }
            SellerResolution::NoSellerLine => {
                return Err(IngestError::UnresolvedSeller { order_id }.into());
            }
        };

        let split = compute_split(event.amount_cents, attribution.fee)?;

        let inserted = self
            .store
            .create_transaction_with_credit(NewTransaction {
                order_id,
                seller_id: attribution.seller_id,
                payment_intent_id: event.payment_intent_id.clone(),
                gross_amount_cents: event.amount_cents,
                net_credit_cents: split.net_credit_cents,
            })
            .await?;

        match inserted {
            IngestInsert::Created(transaction) => {
                info!(
                    transaction_id = %transaction.id,
                    seller_id = %attribution.seller_id,
                    payment_intent_id = %event.payment_intent_id,
                    gross_cents = event.amount_cents,
                    platform_fee_cents = split.platform_fee_cents,
                    net_credit_cents = split.net_credit_cents,
                    "✓ Payment ingested"
                );
                Ok(IngestOutcome {
                    created: true,
                    transaction,
                })
            }
            IngestInsert::AlreadyExists(transaction) => Ok(IngestOutcome {
                created: false,
                transaction,
            }),
        }
    }
}
