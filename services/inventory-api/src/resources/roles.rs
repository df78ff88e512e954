use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl Entity for Role {
    const SCHEMA: TableSchema = TableSchema {
        table: "roles",
        columns: &["name", "description"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Role {
    const NAME: &'static str = "Role";
    const PLURAL: &'static str = "Roles";
    const COLLECTION: &'static str = "roles";

    type Create = RoleInput;
    type Update = RoleInput;

    fn create_changes(input: RoleInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: RoleInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: RoleInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("description", input.description)
}
