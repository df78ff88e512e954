use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use crate::upload::UploadTarget;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Payment instrument (cheque, draft, ...) with a scanned picture
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Instrument {
    pub id: i64,
    pub number: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InstrumentInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub number: String,
    #[serde(deserialize_with = "form::float")]
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub amount: f64,
    #[serde(deserialize_with = "form::date")]
    pub date: NaiveDate,
}

impl Entity for Instrument {
    const SCHEMA: TableSchema = TableSchema {
        table: "instruments",
        columns: &["number", "amount", "date", "picture"],
        attachment: Some("picture"),
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn attachment(&self) -> Option<&str> {
        self.picture.as_deref()
    }
}

impl Resource for Instrument {
    const NAME: &'static str = "Instrument";
    const PLURAL: &'static str = "Instruments";
    const COLLECTION: &'static str = "instruments";
    const UPLOAD: Option<UploadTarget> = Some(UploadTarget {
        field: "picture",
        label: "picture",
        collection: "instruments",
        prefix: "instrument",
        name_field: "number",
        presigned_field: "picturePresignedUrl",
    });

    type Create = InstrumentInput;
    type Update = InstrumentInput;

    fn create_changes(input: InstrumentInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: InstrumentInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: InstrumentInput) -> Changeset {
    Changeset::new()
        .set("number", input.number)
        .set("amount", input.amount)
        .set("date", input.date)
}
