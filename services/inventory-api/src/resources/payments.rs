use crate::error::{AppError, AppResult};
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Accepted payment methods, stored lower-case
pub const PAYMENT_METHODS: &[&str] = &["cash", "bank_transfer", "instrument", "card"];

/// Money received against a sale
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub sale_id: i64,
    pub amount: f64,
    pub payment_date: NaiveDate,
    pub method: String,
    pub instrument_id: Option<i64>,
    pub banking_id: Option<i64>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentInput {
    #[serde(deserialize_with = "form::int")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub sale_id: i64,
    #[serde(deserialize_with = "form::float")]
    #[validate(range(exclusive_min = 0.0, message = "must be greater than zero"))]
    pub amount: f64,
    #[serde(deserialize_with = "form::date")]
    pub payment_date: NaiveDate,
    #[serde(deserialize_with = "form::text")]
    pub method: String,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub instrument_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_int")]
    pub banking_id: Option<i64>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

impl Entity for Payment {
    const SCHEMA: TableSchema = TableSchema {
        table: "payments",
        columns: &[
            "sale_id",
            "amount",
            "payment_date",
            "method",
            "instrument_id",
            "banking_id",
            "reference",
        ],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Payment {
    const NAME: &'static str = "Payment";
    const PLURAL: &'static str = "Payments";
    const COLLECTION: &'static str = "payments";

    type Create = PaymentInput;
    type Update = PaymentInput;

    fn create_changes(input: PaymentInput) -> AppResult<Changeset> {
        changes(input)
    }

    fn update_changes(input: PaymentInput) -> AppResult<Changeset> {
        changes(input)
    }
}

fn changes(input: PaymentInput) -> AppResult<Changeset> {
    let method = input.method.to_ascii_lowercase();
    if !PAYMENT_METHODS.contains(&method.as_str()) {
        return Err(AppError::Validation(format!(
            "method: must be one of {}",
            PAYMENT_METHODS.join(", ")
        )));
    }
    // The method names the source of funds that has to be on record.
    if method == "instrument" && input.instrument_id.is_none() {
        return Err(AppError::Validation(
            "instrument_id: required for instrument payments".to_string(),
        ));
    }
    if method == "bank_transfer" && input.banking_id.is_none() {
        return Err(AppError::Validation(
            "banking_id: required for bank transfers".to_string(),
        ));
    }

    Ok(Changeset::new()
        .reference("sale_id", "sales", Some(input.sale_id))
        .set("amount", input.amount)
        .set("payment_date", input.payment_date)
        .set("method", method)
        .reference("instrument_id", "instruments", input.instrument_id)
        .reference("banking_id", "banking_details", input.banking_id)
        .set("reference", input.reference))
}
