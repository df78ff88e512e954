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
pub struct Brand {
    pub id: i64,
    pub name: String,
    pub website: Option<String>,
    /// Location URL of the logo object
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BrandInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 150, message = "must be between 1 and 150 characters"))]
    pub name: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(url(message = "must be a valid URL"))]
    pub website: Option<String>,
}

impl Entity for Brand {
    const SCHEMA: TableSchema = TableSchema {
        table: "brand",
        columns: &["name", "website", "logo"],
        attachment: Some("logo"),
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn attachment(&self) -> Option<&str> {
        self.logo.as_deref()
    }
}

impl Resource for Brand {
    const NAME: &'static str = "Brand";
    const PLURAL: &'static str = "Brands";
    const COLLECTION: &'static str = "brands";
    const UPLOAD: Option<UploadTarget> = Some(UploadTarget {
        field: "logo",
        label: "logo",
        collection: "brands",
        prefix: "brand",
        name_field: "name",
        presigned_field: "logoPresignedUrl",
    });

    type Create = BrandInput;
    type Update = BrandInput;

    fn create_changes(input: BrandInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: BrandInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: BrandInput) -> Changeset {
    Changeset::new()
        .set("name", input.name)
        .set("website", input.website)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_logo_is_not_an_input_column() {
        let input: BrandInput =
            serde_json::from_value(json!({"name": "Acme", "logo": "https://evil.example/x.png"}))
                .unwrap();
        let changes = Brand::create_changes(input).unwrap();

        assert!(changes.assignments().iter().all(|a| a.column != "logo"));
        assert!(changes.new_attachment().is_none());
    }

    #[test]
    fn test_website_must_be_url() {
        let input: BrandInput =
            serde_json::from_value(json!({"name": "Acme", "website": "acme"})).unwrap();
        let err = crate::error::AppError::from(input.validate().unwrap_err());
        assert_eq!(err.to_string(), "website: must be a valid URL");
    }
}
