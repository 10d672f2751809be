use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::store::{Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Travel,
    Meals,
    Accommodation,
    Equipment,
    #[serde(rename = "Office Supplies")]
    OfficeSupplies,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl ExpenseStatus {
    pub const ALL: [ExpenseStatus; 4] = [
        ExpenseStatus::Pending,
        ExpenseStatus::Approved,
        ExpenseStatus::Rejected,
        ExpenseStatus::Paid,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub employee: Uuid,
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub status: ExpenseStatus,
    #[serde(default)]
    pub approved_by: Option<Uuid>,
    #[serde(default)]
    pub approval_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Expense {
    const COLLECTION: Collection = Collection::Expenses;

    fn id(&self) -> Uuid {
        self.id
    }
}
