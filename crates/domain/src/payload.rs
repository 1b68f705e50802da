//! Typed view over the ingress order payload.
//!
//! The wire format is a JSON object (`HashMap<String, Value>` once
//! decoded); this module validates the small set of keys the
//! orchestrator and participants rely on while leaving the rest of the
//! object to flow through opaquely in the saga context.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The known keys carried end-to-end through a saga's context, as
/// required by the order fulfillment contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayload {
    pub order_id: Option<String>,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_amount: f64,
    pub address: String,

    /// Any additional keys present on the ingress message, carried
    /// forward opaquely.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl OrderPayload {
    /// Parses and validates an ingress JSON object, checking that every
    /// required key (§6) is present and of the expected type.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DomainError> {
        let payload: OrderPayload = serde_json::from_value(value.clone())
            .map_err(|err| DomainError::MalformedPayload(err.to_string()))?;

        if payload.customer_id.is_empty() {
            return Err(DomainError::MalformedPayload(
                "customer_id must not be empty".to_string(),
            ));
        }
        if payload.product_id.is_empty() {
            return Err(DomainError::MalformedPayload(
                "product_id must not be empty".to_string(),
            ));
        }
        if payload.quantity <= 0 {
            return Err(DomainError::MalformedPayload(
                "quantity must be positive".to_string(),
            ));
        }

        Ok(payload)
    }

    /// Flattens this payload into the generic string-keyed map used as
    /// saga context and command payloads.
    pub fn into_context(self) -> HashMap<String, serde_json::Value> {
        let mut context = self.extra;
        if let Some(order_id) = self.order_id {
            context.insert("order_id".to_string(), serde_json::json!(order_id));
        }
        context.insert("customer_id".to_string(), serde_json::json!(self.customer_id));
        context.insert("product_id".to_string(), serde_json::json!(self.product_id));
        context.insert("quantity".to_string(), serde_json::json!(self.quantity));
        context.insert(
            "total_amount".to_string(),
            serde_json::json!(self.total_amount),
        );
        context.insert("address".to_string(), serde_json::json!(self.address));
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_ingress_payload() {
        let value = serde_json::json!({
            "customer_id": "CUST-1",
            "product_id": "P-1",
            "quantity": 2,
            "total_amount": 199.98,
            "address": "A1"
        });

        let payload = OrderPayload::from_json(&value).unwrap();
        assert_eq!(payload.customer_id, "CUST-1");
        assert!(payload.order_id.is_none());
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let value = serde_json::json!({
            "customer_id": "CUST-1",
            "product_id": "P-1",
            "quantity": 0,
            "total_amount": 1.0,
            "address": "A1"
        });

        assert!(OrderPayload::from_json(&value).is_err());
    }

    #[test]
    fn unknown_keys_survive_into_context() {
        let value = serde_json::json!({
            "customer_id": "CUST-1",
            "product_id": "P-1",
            "quantity": 1,
            "total_amount": 9.99,
            "address": "A1",
            "gift_note": "happy birthday"
        });

        let context = OrderPayload::from_json(&value).unwrap().into_context();
        assert_eq!(context.get("gift_note").unwrap(), "happy birthday");
    }
}
