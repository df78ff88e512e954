use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub country_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CityInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub country_id: i64,
}

impl Entity for City {
    const SCHEMA: TableSchema = TableSchema {
        table: "cities",
        columns: &["name", "country_id"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for City {
    const NAME: &'static str = "City";
    const PLURAL: &'static str = "Cities";
    const COLLECTION: &'static str = "cities";

    type Create = CityInput;
    type Update = CityInput;

    fn create_changes(input: CityInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: CityInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: CityInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .reference("country_id", "countries", Some(input.country_id))
}
