use crate::error::AppResult;
use crate::form;
use crate::repository::{Changeset, Entity, TableSchema};
use crate::service::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Bank account referenced by users and organizations
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BankingDetail {
    pub id: i64,
    pub bank_name: String,
    pub account_title: String,
    pub account_number: String,
    pub iban: Option<String>,
    pub branch_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BankingDetailInput {
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 100))]
    pub bank_name: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 100))]
    pub account_title: String,
    #[serde(deserialize_with = "form::text")]
    #[validate(length(min = 1, max = 50))]
    pub account_number: String,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(min = 15, max = 34, message = "must be between 15 and 34 characters"))]
    pub iban: Option<String>,
    #[serde(default, deserialize_with = "form::opt_text")]
    #[validate(length(max = 20))]
    pub branch_code: Option<String>,
}

impl Entity for BankingDetail {
    const SCHEMA: TableSchema = TableSchema {
        table: "banking_details",
        columns: &[
            "bank_name",
            "account_title",
            "account_number",
            "iban",
            "branch_code",
        ],
        attachment: None,
    };

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for BankingDetail {
    const NAME: &'static str = "Banking detail";
    const PLURAL: &'static str = "Banking details";
    const COLLECTION: &'static str = "banking_details";

    type Create = BankingDetailInput;
    type Update = BankingDetailInput;

    fn create_changes(input: BankingDetailInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }

    fn update_changes(input: BankingDetailInput) -> AppResult<Changeset> {
        Ok(changes(input))
    }
}

fn changes(input: BankingDetailInput) -> Changeset {
    Changeset::new()
        .set("bank_name", input.bank_name)
        .set("account_title", input.account_title)
        .set("account_number", input.account_number)
        .set("iban", input.iban)
        .set("branch_code", input.branch_code)
}
