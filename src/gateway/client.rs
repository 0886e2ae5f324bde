// Payment gateway client - the external source of truth for payment
// success and amounts. Consumed read-only by reconciliation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{AppResult, ReconcileError};

pub const SUCCEEDED_STATUS: &str = "succeeded";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentAttributes {
    pub status: String,
    /// Amount in minor currency units
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: GatewayMetadata,
}

/// One payment intent as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentRecord {
    pub id: String,
    pub attributes: GatewayPaymentAttributes,
}

impl GatewayPaymentRecord {
    pub fn is_succeeded(&self) -> bool {
        self.attributes.status == SUCCEEDED_STATUS
    }

    /// Order reference recovered from gateway metadata, if any
    pub fn order_id(&self) -> Option<i64> {
        self.attributes
            .metadata
            .order_id
            .as_deref()
            .and_then(|raw| raw.parse().ok())
    }
}

#[derive(Debug, Deserialize)]
struct GatewayListResponse {
    data: Vec<GatewayPaymentRecord>,
}

/// Read access to the gateway's payment list.
///
/// Reconciliation tests substitute a scripted implementation.
#[async_trait]
pub trait PaymentGatewayClient: Send + Sync {
    /// Full payment list for `[from, to]`. A truncated page is never
    /// silently accepted as complete; the client paginates until the
    /// gateway returns a short page.
    async fn list_payments(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<GatewayPaymentRecord>>;
}

/// HTTP gateway client with bounded timeouts and cursor pagination
pub struct HttpGatewayClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    page_limit: usize,
}

impl HttpGatewayClient {
    pub fn new(
        base_url: String,
        secret_key: String,
        timeout: Duration,
        page_limit: usize,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            secret_key,
            page_limit,
        })
    }

    async fn fetch_page(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        starting_after: Option<&str>,
    ) -> AppResult<Vec<GatewayPaymentRecord>> {
        let url = format!("{}/payment_intents", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("created_at[gte]", from.timestamp().to_string()),
            ("created_at[lte]", to.timestamp().to_string()),
            ("limit", self.page_limit.to_string()),
        ];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| ReconcileError::GatewayFetchFailed(format!("request error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReconcileError::GatewayFetchFailed(format!(
                "gateway returned {}",
                status
            ))
            .into());
        }

        let body: GatewayListResponse = response
            .json()
            .await
            .map_err(|e| ReconcileError::GatewayFetchFailed(format!("invalid body: {}", e)))?;

        Ok(body.data)
    }
}

#[async_trait]
impl PaymentGatewayClient for HttpGatewayClient {
    async fn list_payments(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<GatewayPaymentRecord>> {
        let mut records: Vec<GatewayPaymentRecord> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.fetch_page(from, to, cursor.as_deref()).await?;
            let page_len = page.len();
            debug!(page_len, "Fetched gateway payment page");
            records.extend(page);

            // A full page may be truncated; follow the cursor until the
            // gateway hands back a short one.
            if page_len < self.page_limit {
                break;
            }
            cursor = records.last().map(|r| r.id.clone());
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserialization() {
        let raw = r#"{
            "data": [{
                "id": "pi_123",
                "attributes": {
                    "status": "succeeded",
                    "amount": 2000,
                    "created_at": "2026-08-20T12:00:00Z",
                    "metadata": { "order_id": "42" }
                }
            }]
        }"#;

        let parsed: GatewayListResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 1);
        let record = &parsed.data[0];
        assert!(record.is_succeeded());
        assert_eq!(record.attributes.amount, 2000);
        assert_eq!(record.order_id(), Some(42));
    }

    #[test]
    fn test_missing_metadata_defaults_to_none() {
        let raw = r#"{
            "id": "pi_9",
            "attributes": {
                "status": "failed",
                "amount": 100,
                "created_at": "2026-08-20T12:00:00Z"
            }
        }"#;

        let record: GatewayPaymentRecord = serde_json::from_str(raw).unwrap();
        assert!(!record.is_succeeded());
        assert_eq!(record.order_id(), None);
    }

    #[test]
    fn test_non_numeric_order_id_is_unrecoverable() {
        let raw = r#"{
            "id": "pi_10",
            "attributes": {
                "status": "succeeded",
                "amount": 100,
                "created_at": "2026-08-20T12:00:00Z",
                "metadata": { "order_id": "not-a-number" }
            }
        }"#;

        let record: GatewayPaymentRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.order_id(), None);
    }
}
