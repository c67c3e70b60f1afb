use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::categories::repo_types::Category;

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Outcome,
}

/// Transaction record in the database.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    #[sqlx(rename = "type")]
    pub kind: TransactionType,
    pub date: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a transaction.
///
/// `user_id` is always the caller, never taken from request input. A missing
/// `date` is filled in with the current time by the repository.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    pub kind: TransactionType,
    pub date: Option<OffsetDateTime>,
}

/// A transaction with its category expanded, as returned by paged reads.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionWithCategory {
    pub transaction: Transaction,
    pub category: Option<Category>,
}
