use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ShippingAgent {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingAgentInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

impl Entity for ShippingAgent {
    const SCHEMA: TableSchema = TableSchema {
        table: "shipping_agents",
        columns: &["name", "phone", "email", "address"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for ShippingAgent {
    const NAME: &'static str = "Shipping agent";
    const PLURAL: &'static str = "Shipping agents";
    const COLLECTION: &'static str = "shipping_agents";

    type Create = ShippingAgentInput;
    type Update = ShippingAgentInput;

    fn create_changes(input: ShippingAgentInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: ShippingAgentInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: ShippingAgentInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("phone", input.phone)
        .set("email", input.email)
        .set("address", input.address)
}
