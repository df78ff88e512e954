use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Vendor {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VendorInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

impl Entity for Vendor {
    const SCHEMA: TableSchema = TableSchema {
        table: "vendors",
        columns: &["name", "email", "phone", "address"],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Vendor {
    const NAME: &'static str = "Vendor";
    const PLURAL: &'static str = "Vendors";
    const COLLECTION: &'static str = "vendors";

    type Create = VendorInput;
    type Update = VendorInput;

    fn create_changes(input: VendorInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: VendorInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: VendorInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("email", input.email)
        .set("phone", input.phone)
        .set("address", input.address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_email() {
        let input: VendorInput =
            serde_json::from_value(json!({"name": "Parts Co", "email": "not-an-email"})).unwrap();
        let err = crate::error::AppError::from(input.validate().unwrap_err());
        assert_eq!(err.to_string(), "email: must be a valid email address");
    }

    #[test]
    fn test_blank_optional_fields_become_null() {
        let input: VendorInput =
            serde_json::from_value(json!({"name": "Parts Co", "email": "", "phone": " "}))
                .unwrap();
        assert!(input.validate().is_ok());
        assert!(input.email.is_none());
        assert!(input.phone.is_none());
    }
}
