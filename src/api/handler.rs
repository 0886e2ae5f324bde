use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::models::{PaymentWebhookPayload, WebhookResponse};
use crate::{
    error::AppResult,
    ingestion::PaymentIngestionService,
    ledger::{models::SellerBalance, SettlementStore},
    reconciliation::{ReconciliationReport, ReconciliationService},
    settlement::{SettlementService, SettlementSummary},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SettlementStore>,
    pub ingestion: Arc<PaymentIngestionService>,
    pub settlement: Arc<SettlementService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub maturity_window: Duration,
    pub reconcile_lookback: Duration,
}

/// GET /health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Gateway payment webhook
/// POST /api/v1/webhook/payment
///
/// Duplicate deliveries are expected and answered with 200 and
/// `created=false`; the gateway retries on anything else.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhookPayload>,
) -> AppResult<Json<WebhookResponse>> {
    info!(
        payment_intent_id = %payload.id,
        status = %payload.status,
        amount_cents = payload.amount,
        "⚙️ Payment webhook received"
    );

    if !payload.is_succeeded() {
        // Only succeeded events move money
        return Ok(Json(WebhookResponse {
            created: false,
            transaction_id: None,
        }));
    }

    let outcome = state.ingestion.ingest(&payload.to_event()).await?;
    Ok(Json(WebhookResponse {
        created: outcome.created,
        transaction_id: Some(outcome.transaction.id),
    }))
}

/// GET /api/v1/sellers/:seller_id/balance
pub async fn get_seller_balance(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
) -> AppResult<Json<SellerBalance>> {
    let balance = state.store.get_balance(seller_id).await?;
    Ok(Json(balance))
}

/// Run one settlement pass now - the external scheduler's entry point
/// POST /api/v1/admin/settlement/run
pub async fn run_settlement(
    State(state): State<AppState>,
) -> AppResult<Json<SettlementSummary>> {
    let summary = state
        .settlement
        .run_settlement_pass(state.maturity_window, Utc::now())
        .await?;
    Ok(Json(summary))
}

/// Run one reconciliation pass now
/// POST /api/v1/admin/reconciliation/run
pub async fn run_reconciliation(
    State(state): State<AppState>,
) -> AppResult<Json<ReconciliationReport>> {
    let to = Utc::now();
    let from = to - state.reconcile_lookback;
    let report = state.reconciliation.run_reconciliation_pass(from, to).await?;
    Ok(Json(report))
}
