use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub city_id: Option<i64>,
    pub organization_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WarehouseInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub city_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub organization_id: Option<i64>,
}

impl Entity for Warehouse {
    const SCHEMA: TableSchema = TableSchema {
        table: "warehouses",
        columns: &["name", "address", "city_id", "organization_id"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Warehouse {
    const NAME: &'static str = "Warehouse";
    const PLURAL: &'static str = "Warehouses";
    const COLLECTION: &'static str = "warehouses";

    type Create = WarehouseInput;
    type Update = WarehouseInput;

    fn create_changes(input: WarehouseInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: WarehouseInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: WarehouseInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("address", input.address)
        .reference("city_id", "cities", input.city_id)
        .reference("organization_id", "organization", input.organization_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_present_references_are_checked() {
        let input: WarehouseInput =
            serde_json::from_value(json!({"name": "North depot", "city_id": "3", "organization_id": ""}))
                .unwrap();
        let changes = Warehouse::create_changes(input).unwrap();

        let tables: Vec<_> = changes.references().iter().map(|r| r.table).collect();
        assert_eq!(tables, vec!["cities"]);
        assert_eq!(changes.assignments().len(), 4);
    }
}
