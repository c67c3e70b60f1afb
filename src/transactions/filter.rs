//! Turns the optional filter fields a caller sends into a normalized,
//! user-scoped predicate over transactions.
//!
//! The predicate is plain data. The PostgreSQL repository renders it into a
//! `WHERE` clause and the in-memory store evaluates it with
//! [`TransactionFilter::matches`]; both must agree.

use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Transaction, TransactionType};

/// Partially specified filter as received from the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilters {
    pub title: Option<String>,
    pub kind: Option<TransactionType>,
    pub category_id: Option<Uuid>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

/// Normalized predicate. Absent fields impose no constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    pub user_id: Uuid,
    /// Case-sensitive substring of the title. Never empty.
    pub title: Option<String>,
    pub kind: Option<TransactionType>,
    pub category_id: Option<Uuid>,
    /// Inclusive lower bound on `date`.
    pub start_date: Option<OffsetDateTime>,
    /// Inclusive upper bound on `date`.
    pub end_date: Option<OffsetDateTime>,
}

impl TransactionFilter {
    /// Every transaction of `user_id`.
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            title: None,
            kind: None,
            category_id: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn matches(&self, t: &Transaction) -> bool {
        t.user_id == self.user_id
            && self.title.as_deref().map_or(true, |s| t.title.contains(s))
            && self.kind.map_or(true, |k| t.kind == k)
            && self.category_id.map_or(true, |c| t.category_id == c)
            && self.start_date.map_or(true, |start| t.date >= start)
            && self.end_date.map_or(true, |end| t.date <= end)
    }
}

/// Build the predicate for `user_id` from whatever the caller supplied.
///
/// Total over its input: any combination of present and absent fields,
/// including `None`, yields a valid filter. An empty title is treated as
/// absent.
pub fn build_filter(user_id: Uuid, raw: Option<TransactionFilters>) -> TransactionFilter {
    let Some(raw) = raw else {
        return TransactionFilter::for_user(user_id);
    };

    TransactionFilter {
        user_id,
        title: raw.title.filter(|t| !t.is_empty()),
        kind: raw.kind,
        category_id: raw.category_id,
        start_date: raw.start_date,
        end_date: raw.end_date,
    }
}
