use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub cnic: Option<String>,
    pub address: Option<String>,
    pub city_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 30))]
    pub phone: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    /// National identity card number
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 20))]
    pub cnic: Option<String>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub city_id: Option<i64>,
}

impl Entity for Customer {
    const SCHEMA: TableSchema = TableSchema {
        table: "customers",
        columns: &["name", "phone", "email", "cnic", "address", "city_id"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Customer {
    const NAME: &'static str = "Customer";
    const PLURAL: &'static str = "Customers";
    const COLLECTION: &'static str = "customers";

    type Create = CustomerInput;
    type Update = CustomerInput;

    fn create_changes(input: CustomerInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: CustomerInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: CustomerInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("phone", input.phone)
        .set("email", input.email)
        .set("cnic", input.cnic)
        .set("address", input.address)
        .reference("city_id", "cities", input.city_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phone_is_required() {
        assert!(serde_json::from_value::<CustomerInput>(json!({"name": "Ali"})).is_err());

        let input: CustomerInput =
            serde_json::from_value(json!({"name": "Ali", "phone": "  "})).unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let input: CustomerInput = serde_json::from_value(json!({
            "name": "Ali",
            "phone": "0300-1234567",
            "email": "not-an-email"
        }))
        .unwrap();

        let err = crate::error::AppError::from(input.validate().unwrap_err());
        assert_eq!(err.to_string(), "email: must be a valid email address");
    }
}
