use crate::error::{AppError, AppResult};
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Delivery of a sale through a shipping agent
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Shipment {
    pub id: i64,
    pub sale_id: i64,
    pub shipping_agent_id: Option<i64>,
    pub destination: String,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<NaiveDate>,
    pub delivered_at: Option<NaiveDate>,
    pub status_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShipmentInput {
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub sale_id: i64,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub shipping_agent_id: Option<i64>,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 500))]
    pub destination: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 100))]
    pub tracking_number: Option<String>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub shipped_at: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub delivered_at: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub status_id: Option<i64>,
}

impl Entity for Shipment {
    const SCHEMA: TableSchema = TableSchema {
        table: "shipments",
        columns: &[
            "sale_id",
            "shipping_agent_id",
            "destination",
            "tracking_number",
            "shipped_at",
            "delivered_at",
            "status_id",
        ],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Shipment {
    const NAME: &'static str = "Shipment";
    const PLURAL: &'static str = "Shipments";
    const COLLECTION: &'static str = "shipments";

    type Create = ShipmentInput;
    type Update = ShipmentInput;

    fn create_changes(input: ShipmentInput) -> AppResult<Changeset> {
        changes(input)
    }

    fn update_changes(input: ShipmentInput) -> AppResult<Changeset> {
        changes(input)
    }
}

fn changes(input: ShipmentInput) -> AppResult<Changeset> {
    match (input.shipped_at, input.delivered_at) {
        (None, Some(_)) => {
            return Err(AppError::Validation(
                "delivered_at: requires shipped_at".to_string(),
            ))
        }
        (Some(shipped), Some(delivered)) if delivered < shipped => {
            return Err(AppError::Validation(
                "delivered_at: must not be before shipped_at".to_string(),
            ))
        }
        _ => {}
    }

    Ok(Changeset::new()
        .reference("sale_id", "sales", Some(input.sale_id))
        .reference("shipping_agent_id", "shipping_agents", input.shipping_agent_id)
        .set("destination", input.destination)
        .set("tracking_number", input.tracking_number)
        .set("shipped_at", input.shipped_at)
        .set("delivered_at", input.delivered_at)
        .reference("status_id", "statuses", input.status_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> ShipmentInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sale_and_agent_are_checked() {
        let shipment = input(json!({
            "sale_id": "12",
            "shipping_agent_id": "2",
            "destination": "House 4, Street 9, Lahore",
            "shipped_at": "2024-05-12",
            "delivered_at": "2024-05-14"
        }));
        assert!(shipment.validate().is_ok());

        let changes = Shipment::create_changes(shipment).unwrap();
        let tables: Vec<_> = changes.references().iter().map(|r| r.table).collect();
        assert_eq!(tables, vec!["sales", "shipping_agents"]);
    }

    #[test]
    fn test_delivery_before_dispatch_rejected() {
        let shipment = input(json!({
            "sale_id": 12,
            "destination": "Lahore",
            "shipped_at": "2024-05-12",
            "delivered_at": "2024-05-10"
        }));

        let err = Shipment::create_changes(shipment).unwrap_err();
        assert_eq!(err.to_string(), "delivered_at: must not be before shipped_at");
    }

    #[test]
    fn test_delivery_without_dispatch_rejected() {
        let shipment = input(json!({
            "sale_id": 12,
            "destination": "Lahore",
            "delivered_at": "2024-05-10"
        }));

        assert!(Shipment::create_changes(shipment).is_err());
    }
}
