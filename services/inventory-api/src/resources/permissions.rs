use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Named capability that roles are granted
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl Entity for Permission {
    const SCHEMA: TableSchema = TableSchema {
        table: "permissions",
        columns: &["name", "description"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Permission {
    const NAME: &'static str = "Permission";
    const PLURAL: &'static str = "Permissions";
    const COLLECTION: &'static str = "permissions";

    type Create = PermissionInput;
    type Update = PermissionInput;

    fn create_changes(input: PermissionInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: PermissionInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: PermissionInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("description", input.description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_is_trimmed() {
        let input: PermissionInput =
            serde_json::from_value(json!({"name": " sales:write ", "description": ""})).unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.name, "sales:write");
        assert_eq!(input.description, None);
    }
}
