use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use crate::upload::UploadTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub logo: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub vendor_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub banking_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OrganizationInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 150, message = "must be between 1 and 150 characters"))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(url(message = "must be a valid URL"))]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub vendor_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub admin_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub banking_id: Option<i64>,
}

impl Entity for Organization {
    const SCHEMA: TableSchema = TableSchema {
        table: "organization",
        columns: &[
            "name",
            "logo",
            "website",
            "address",
            "vendor_id",
            "admin_id",
            "banking_id",
        ],
        attachment: Some("logo"),
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn attachment(&self) -> Option<&str> {
        self.logo.as_deref()
    }
}

impl Resource for Organization {
    const NAME: &'static str = "Organization";
    const PLURAL: &'static str = "Organizations";
    const COLLECTION: &'static str = "organizations";
    const UPLOAD: Option<UploadTarget> = Some(UploadTarget {
        field: "logo",
        label: "logo",
        collection: "organizations",
        prefix: "organization",
        name_field: "name",
        presigned_field: "logoPresignedUrl",
    });

    type Create = OrganizationInput;
    type Update = OrganizationInput;

    fn create_changes(input: OrganizationInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: OrganizationInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: OrganizationInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("website", input.website)
        .set("address", input.address)
        .reference("vendor_id", "vendors", input.vendor_id)
        .reference("admin_id", "users", input.admin_id)
        .reference("banking_id", "banking_details", input.banking_id)
}
