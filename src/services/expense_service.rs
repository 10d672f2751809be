use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use super::clock::Clock;
use super::error::{ServiceError, ServiceResult};
use super::require_text;
use crate::auth::AuthUser;
use crate::database::models::{Expense, ExpenseCategory, ExpenseStatus};
use crate::database::store::DocumentStore;
use crate::database::Repository;
use crate::filter::FilterData;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub category: ExpenseCategory,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    pub description: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseUpdate {
    pub category: Option<ExpenseCategory>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub receipt: Option<String>,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub client: Option<String>,
}

/// Optional list filters; `employee` is honoured for admins only
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseQuery {
    pub status: Option<ExpenseStatus>,
    pub category: Option<ExpenseCategory>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub employee: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseReview {
    pub status: ExpenseStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTotals {
    pub status: ExpenseStatus,
    pub count: usize,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseStats {
    pub total_count: usize,
    pub total_amount: Decimal,
    pub by_status: Vec<StatusTotals>,
}

fn validate_amount(amount: Decimal) -> ServiceResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::validation("amount must be positive"));
    }
    Ok(())
}

pub struct ExpenseService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ExpenseService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn expenses(&self) -> Repository<Expense> {
        Repository::new(self.store.clone())
    }

    pub async fn create(&self, input: NewExpense, requester: &AuthUser) -> ServiceResult<Expense> {
        validate_amount(input.amount)?;
        require_text("description", &input.description)?;

        let now = self.clock.now();
        let expense = Expense {
            id: Uuid::new_v4(),
            employee: requester.user_id,
            category: input.category,
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            description: input.description.trim().to_string(),
            receipt: input.receipt,
            date: input.date.unwrap_or_else(|| now.date_naive()),
            location: input.location,
            client: input.client,
            status: ExpenseStatus::Pending,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.expenses().create(&expense).await?;
        Ok(expense)
    }

    /// The requester's expenses, newest first. Admins may list everyone's.
    pub async fn list(&self, query: ExpenseQuery, requester: &AuthUser) -> ServiceResult<Vec<Expense>> {
        let mut clause = Map::new();
        match (requester.is_elevated(), query.employee) {
            (true, Some(employee)) => {
                clause.insert("employee".into(), json!(employee));
            }
            (true, None) => {}
            (false, _) => {
                clause.insert("employee".into(), json!(requester.user_id));
            }
        }
        if let Some(status) = query.status {
            clause.insert("status".into(), json!(status));
        }
        if let Some(category) = query.category {
            clause.insert("category".into(), json!(category));
        }
        let mut range = Map::new();
        if let Some(start) = query.start_date {
            range.insert("$gte".into(), json!(start));
        }
        if let Some(end) = query.end_date {
            range.insert("$lte".into(), json!(end));
        }
        if !range.is_empty() {
            clause.insert("date".into(), Value::Object(range));
        }

        let mut expenses = self.expenses().select_any(FilterData::where_clause(Value::Object(clause))).await?;
        expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(expenses)
    }

    pub async fn get(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<Expense> {
        let expense = self
            .expenses()
            .select_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Expense"))?;
        if !requester.can_access(expense.employee) {
            return Err(ServiceError::forbidden("expense belongs to another employee"));
        }
        Ok(expense)
    }

    /// Owners may edit their expenses while they are still pending
    pub async fn update(&self, id: Uuid, update: ExpenseUpdate, requester: &AuthUser) -> ServiceResult<Expense> {
        let mut expense = self.owned(id, requester).await?;
        if expense.status != ExpenseStatus::Pending {
            return Err(ServiceError::Conflict("only pending expenses can be edited".into()));
        }

        if let Some(amount) = update.amount {
            validate_amount(amount)?;
            expense.amount = amount;
        }
        if let Some(description) = update.description {
            require_text("description", &description)?;
            expense.description = description.trim().to_string();
        }
        if let Some(category) = update.category {
            expense.category = category;
        }
        if let Some(currency) = update.currency {
            expense.currency = currency;
        }
        if let Some(receipt) = update.receipt {
            expense.receipt = Some(receipt);
        }
        if let Some(date) = update.date {
            expense.date = date;
        }
        if let Some(location) = update.location {
            expense.location = Some(location);
        }
        if let Some(client) = update.client {
            expense.client = Some(client);
        }
        expense.updated_at = self.clock.now();

        if !self.expenses().update(&expense).await? {
            return Err(ServiceError::not_found("Expense"));
        }
        Ok(expense)
    }

    pub async fn delete(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<()> {
        let expense = self.owned(id, requester).await?;
        if !self.expenses().delete_id(expense.id).await? {
            return Err(ServiceError::not_found("Expense"));
        }
        Ok(())
    }

    /// Admin decision: Pending -> Approved | Rejected, Approved -> Paid
    pub async fn review(&self, id: Uuid, review: ExpenseReview, requester: &AuthUser) -> ServiceResult<Expense> {
        if !requester.is_elevated() {
            return Err(ServiceError::forbidden("only admins may review expenses"));
        }
        let mut expense = self
            .expenses()
            .select_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Expense"))?;

        let allowed = matches!(
            (expense.status, review.status),
            (ExpenseStatus::Pending, ExpenseStatus::Approved)
                | (ExpenseStatus::Pending, ExpenseStatus::Rejected)
                | (ExpenseStatus::Approved, ExpenseStatus::Paid)
        );
        if !allowed {
            return Err(ServiceError::Conflict(format!(
                "cannot move expense from {:?} to {:?}",
                expense.status, review.status
            )));
        }

        let now = self.clock.now();
        match review.status {
            ExpenseStatus::Rejected => {
                let reason = review.rejection_reason.unwrap_or_default();
                require_text("rejection_reason", &reason)?;
                expense.rejection_reason = Some(reason);
            }
            ExpenseStatus::Approved => {
                expense.approved_by = Some(requester.user_id);
                expense.approval_date = Some(now);
            }
            _ => {}
        }
        expense.status = review.status;
        expense.updated_at = now;

        if !self.expenses().update(&expense).await? {
            return Err(ServiceError::not_found("Expense"));
        }
        info!("Expense {} marked {:?} by {}", expense.id, expense.status, requester.user_id);
        Ok(expense)
    }

    /// Counts and amounts per status over the requester's own expenses
    pub async fn stats(&self, requester: &AuthUser) -> ServiceResult<ExpenseStats> {
        let expenses = self
            .expenses()
            .select_any(FilterData::where_clause(json!({ "employee": requester.user_id })))
            .await?;

        let by_status = ExpenseStatus::ALL
            .iter()
            .map(|status| {
                let matching = expenses.iter().filter(|e| e.status == *status);
                StatusTotals {
                    status: *status,
                    count: matching.clone().count(),
                    amount: matching.map(|e| e.amount).sum(),
                }
            })
            .collect();

        Ok(ExpenseStats {
            total_count: expenses.len(),
            total_amount: expenses.iter().map(|e| e.amount).sum(),
            by_status,
        })
    }

    async fn owned(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<Expense> {
        let expense = self
            .expenses()
            .select_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Expense"))?;
        if expense.employee != requester.user_id {
            return Err(ServiceError::forbidden("expense belongs to another employee"));
        }
        Ok(expense)
    }
}
