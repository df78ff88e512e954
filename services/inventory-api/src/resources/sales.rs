use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One sale of an item to a customer
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sale {
    pub id: i64,
    pub customer_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
    pub sale_date: NaiveDate,
    pub status_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaleInput {
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub customer_id: i64,
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub item_id: i64,
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i64,
    #[serde(deserialize_with = "form::float")]
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub unit_price: f64,
    #[serde(deserialize_with = "form::date")]
    pub sale_date: NaiveDate,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub status_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl Entity for Sale {
    const SCHEMA: TableSchema = TableSchema {
        table: "sales",
        columns: &[
            "customer_id",
            "item_id",
            "quantity",
            "unit_price",
            "sale_date",
            "status_id",
            "notes",
        ],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Sale {
    const NAME: &'static str = "Sale";
    const PLURAL: &'static str = "Sales";
    const COLLECTION: &'static str = "sales";

    type Create = SaleInput;
    type Update = SaleInput;

    fn create_changes(input: SaleInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: SaleInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: SaleInput) -> Changeset {
    Changeset::new()
        .reference("customer_id", "customers", Some(input.customer_id))
        .reference("item_id", "items", Some(input.item_id))
        .set("quantity", input.quantity)
        .set("unit_price", input.unit_price)
        .set("sale_date", input.sale_date)
        .reference("status_id", "statuses", input.status_id)
        .set("notes", input.notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_customer_and_item_are_checked() {
        let input: SaleInput = serde_json::from_value(json!({
            "customer_id": "7",
            "item_id": 3,
            "quantity": "1",
            "unit_price": "155000",
            "sale_date": "2024-05-10"
        }))
        .unwrap();
        assert!(input.validate().is_ok());

        let changes = Sale::create_changes(input).unwrap();
        let tables: Vec<_> = changes.references().iter().map(|r| r.table).collect();
        assert_eq!(tables, vec!["customers", "items"]);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let input: SaleInput = serde_json::from_value(json!({
            "customer_id": 7,
            "item_id": 3,
            "quantity": 0,
            "unit_price": 1,
            "sale_date": "2024-05-10"
        }))
        .unwrap();

        let err = crate::error::AppError::from(input.validate().unwrap_err());
        assert_eq!(err.to_string(), "quantity: must be at least 1");
    }
}
