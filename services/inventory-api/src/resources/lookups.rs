//! Single-column lookup tables: statuses, item types and capacity types.

use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct NameInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
}

fn name_changes(input: NameInput) -> AppResult<Changeset> {
    Ok(Changeset::new().set("name", input.name))
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Status {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Status {
    const SCHEMA: TableSchema = TableSchema {
        table: "statuses",
        columns: &["name"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Status {
    const NAME: &'static str = "Status";
    const PLURAL: &'static str = "Statuses";
    const COLLECTION: &'static str = "statuses";

    type Create = NameInput;
    type Update = NameInput;

    fn create_changes(input: NameInput) -> AppResult<Changeset> {
        name_changes(input)
    }

    fn update_changes(input: NameInput) -> AppResult<Changeset> {
        name_changes(input)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ItemType {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for ItemType {
    const SCHEMA: TableSchema = TableSchema {
        table: "item_types",
        columns: &["name"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for ItemType {
    const NAME: &'static str = "Item type";
    const PLURAL: &'static str = "Item types";
    const COLLECTION: &'static str = "item_types";

    type Create = NameInput;
    type Update = NameInput;

    fn create_changes(input: NameInput) -> AppResult<Changeset> {
        name_changes(input)
    }

    fn update_changes(input: NameInput) -> AppResult<Changeset> {
        name_changes(input)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CapacityType {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for CapacityType {
    const SCHEMA: TableSchema = TableSchema {
        table: "capacity_types",
        columns: &["name"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for CapacityType {
    const NAME: &'static str = "Capacity type";
    const PLURAL: &'static str = "Capacity types";
    const COLLECTION: &'static str = "capacity_types";

    type Create = NameInput;
    type Update = NameInput;

    fn create_changes(input: NameInput) -> AppResult<Changeset> {
        name_changes(input)
    }

    fn update_changes(input: NameInput) -> AppResult<Changeset> {
        name_changes(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::parse_id;
    use serde_json::json;

    #[test]
    fn test_name_required() {
        let input: NameInput = serde_json::from_value(json!({"name": ""})).unwrap();
        let err = crate::error::AppError::from(input.validate().unwrap_err());
        assert_eq!(err.to_string(), "name: must be between 1 and 100 characters");
    }

    #[test]
    fn test_multi_word_names_in_messages() {
        assert_eq!(
            parse_id::<ItemType>("nope").unwrap_err().to_string(),
            "Invalid item type ID"
        );
        assert_eq!(
            parse_id::<CapacityType>("-1").unwrap_err().to_string(),
            "Invalid capacity type ID"
        );
    }
}
