use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CountryInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// ISO 3166 alpha-2 or alpha-3
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(min = 2, max = 3, message = "must be 2 or 3 characters"))]
    pub code: Option<String>,
}

impl Entity for Country {
    const SCHEMA: TableSchema = TableSchema {
        table: "countries",
        columns: &["name", "code"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Country {
    const NAME: &'static str = "Country";
    const PLURAL: &'static str = "Countries";
    const COLLECTION: &'static str = "countries";

    type Create = CountryInput;
    type Update = CountryInput;

    fn create_changes(input: CountryInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: CountryInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: CountryInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("code", input.code.map(|code| code.to_uppercase()))
}
