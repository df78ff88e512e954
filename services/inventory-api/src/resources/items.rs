use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Stock line: a sellable item and how many are held
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub item_type_id: i64,
    pub brand_id: Option<i64>,
    pub capacity_type_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub status_id: Option<i64>,
    pub price: f64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ItemInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 64))]
    pub sku: Option<String>,
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub item_type_id: i64,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub brand_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub capacity_type_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub warehouse_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub status_id: Option<i64>,
    #[serde(deserialize_with = "form::float")]
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub price: f64,
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 0, message = "must not be negative"))]
    pub quantity: i64,
}

impl Entity for Item {
    const SCHEMA: TableSchema = TableSchema {
        table: "items",
        columns: &[
            "name",
            "sku",
            "item_type_id",
            "brand_id",
            "capacity_type_id",
            "warehouse_id",
            "status_id",
            "price",
            "quantity",
        ],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Item {
    const NAME: &'static str = "Item";
    const PLURAL: &'static str = "Items";
    const COLLECTION: &'static str = "items";

    type Create = ItemInput;
    type Update = ItemInput;

    fn create_changes(input: ItemInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: ItemInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: ItemInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("sku", input.sku)
        .reference("item_type_id", "item_types", Some(input.item_type_id))
        .reference("brand_id", "brand", input.brand_id)
        .reference("capacity_type_id", "capacity_types", input.capacity_type_id)
        .reference("warehouse_id", "warehouses", input.warehouse_id)
        .reference("status_id", "statuses", input.status_id)
        .set("price", input.price)
        .set("quantity", input.quantity)
}
