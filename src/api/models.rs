use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingestion::PaymentEvent;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Gateway webhook payload for a payment event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhookPayload {
    /// Gateway payment-intent identifier
    pub id: String,
    pub status: String,
    /// Gross amount in minor currency units
    pub amount: i64,
    #[serde(default)]
    pub metadata: WebhookMetadata,
}

impl PaymentWebhookPayload {
    pub fn is_succeeded(&self) -> bool {
        self.status == crate::gateway::client::SUCCEEDED_STATUS
    }

    pub fn to_event(&self) -> PaymentEvent {
        PaymentEvent {
            payment_intent_id: self.id.clone(),
            amount_cents: self.amount,
            order_id: self
                .metadata
                .order_id
                .as_deref()
                .and_then(|raw| raw.parse().ok()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_payload_maps_to_event() {
        let raw = r#"{
            "id": "pi_123",
            "status": "succeeded",
            "amount": 2000,
            "metadata": { "order_id": "42" }
        }"#;

        let payload: PaymentWebhookPayload = serde_json::from_str(raw).unwrap();
        assert!(payload.is_succeeded());

        let event = payload.to_event();
        assert_eq!(event.payment_intent_id, "pi_123");
        assert_eq!(event.amount_cents, 2000);
        assert_eq!(event.order_id, Some(42));
    }

    #[test]
    fn test_webhook_payload_without_metadata() {
        let raw = r#"{ "id": "pi_1", "status": "failed", "amount": 100 }"#;
        let payload: PaymentWebhookPayload = serde_json::from_str(raw).unwrap();
        assert!(!payload.is_succeeded());
        assert_eq!(payload.to_event().order_id, None);
    }
}
