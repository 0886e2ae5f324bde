use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Commission error: {0}")]
    Commission(#[from] CommissionError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External error: {0}")]
    External(String),
}

/// Commission Engine input contract violations.
/// Rejected immediately, never retried automatically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommissionError {
    #[error("Invalid gross amount: {amount_cents} cents (must be > 0)")]
    InvalidAmount { amount_cents: i64 },

    #[error("Invalid fee configuration: rate {rate} outside [0, 1)")]
    InvalidFeeConfig { rate: f64 },
}

/// Payment ingestion attribution failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("Cannot resolve order for payment intent {payment_intent_id}")]
    UnresolvedOrder { payment_intent_id: String },

    #[error("Order {order_id} has no seller-attributed product line")]
    UnresolvedSeller { order_id: i64 },
}

/// Ledger invariant guards
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error(
        "Insufficient pending balance for seller {seller_id}: requested {requested_cents}, available {pending_cents}"
    )]
    InsufficientPendingBalance {
        seller_id: Uuid,
        requested_cents: i64,
        pending_cents: i64,
    },

    #[error("Invalid transfer amount: {amount_cents} cents (must be > 0)")]
    InvalidTransferAmount { amount_cents: i64 },
}

/// Reconciliation pass-level errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Gateway fetch failed: {0}")]
    GatewayFetchFailed(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Commission(CommissionError::InvalidAmount { amount_cents }) => (
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
                format!("Invalid gross amount: {} cents", amount_cents),
                Some(serde_json::json!({ "amount_cents": amount_cents })),
            ),
            AppError::Commission(CommissionError::InvalidFeeConfig { rate }) => (
                StatusCode::BAD_REQUEST,
                "INVALID_FEE_CONFIG",
                format!("Fee rate {} outside [0, 1)", rate),
                Some(serde_json::json!({ "rate": rate })),
            ),
            AppError::Ingest(IngestError::UnresolvedOrder { payment_intent_id }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNRESOLVED_ORDER",
                format!(
                    "Cannot resolve order for payment intent {}",
                    payment_intent_id
                ),
                Some(serde_json::json!({ "payment_intent_id": payment_intent_id })),
            ),
            AppError::Ingest(IngestError::UnresolvedSeller { order_id }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNRESOLVED_SELLER",
                format!("Order {} has no seller-attributed product line", order_id),
                Some(serde_json::json!({ "order_id": order_id })),
            ),
            AppError::Ledger(LedgerError::InsufficientPendingBalance {
                seller_id,
                requested_cents,
                pending_cents,
            }) => (
                StatusCode::CONFLICT,
                "INSUFFICIENT_PENDING_BALANCE",
                format!("Insufficient pending balance for seller {}", seller_id),
                Some(serde_json::json!({
                    "seller_id": seller_id,
                    "requested_cents": requested_cents,
                    "pending_cents": pending_cents,
                })),
            ),
            AppError::Reconcile(ReconcileError::GatewayFetchFailed(msg)) => (
                StatusCode::BAD_GATEWAY,
                "GATEWAY_FETCH_FAILED",
                format!("Gateway fetch failed: {}", msg),
                None,
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::External(format!("HTTP request error: {:?}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
