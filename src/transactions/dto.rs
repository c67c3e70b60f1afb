use serde::{Deserialize, Deserializer, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::{
    categories::dto::CategoryResponse,
    config::PaginationConfig,
    error::{AppError, AppResult},
    transactions::{
        filter::TransactionFilters,
        pagination::{parse_param, PageInfo},
        repo_types::{Transaction, TransactionType, TransactionWithCategory},
    },
};

/// Distinguishes an omitted field (`None`) from an explicit `null`
/// (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category_id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryResponse>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            amount: t.amount,
            kind: t.kind,
            category_id: t.category_id,
            user_id: t.user_id,
            date: t.date,
            created_at: t.created_at,
            updated_at: t.updated_at,
            category: None,
        }
    }
}

impl From<TransactionWithCategory> for TransactionResponse {
    fn from(row: TransactionWithCategory) -> Self {
        Self {
            category: row.category.map(Into::into),
            ..row.transaction.into()
        }
    }
}

/// Response of the paginated listing.
#[derive(Debug, Serialize)]
pub struct TransactionConnection {
    pub transactions: Vec<TransactionResponse>,
    pub pagination: PageInfo,
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title cannot be empty".into()));
    }
    Ok(title.to_string())
}

fn validate_amount(amount: f64) -> AppResult<f64> {
    if !amount.is_finite() {
        return Err(AppError::Validation("amount must be a finite number".into()));
    }
    Ok(amount)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category_id: Uuid,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

impl CreateTransactionRequest {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            title: validate_title(&self.title)?,
            amount: validate_amount(self.amount)?,
            ..self
        })
    }
}

/// Partial update of a transaction.
///
/// Precedence: a field present in the patch replaces the stored value, an
/// omitted field keeps it. `description` is the only nullable column, so it
/// alone tells `null` (clear it) apart from omission (keep it). For the other
/// fields `null` and omission both keep the stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub category_id: Option<Uuid>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

impl TransactionPatch {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            title: self.title.as_deref().map(validate_title).transpose()?,
            amount: self.amount.map(validate_amount).transpose()?,
            ..self
        })
    }

    /// Merge the patch over `existing`, following the precedence above.
    pub fn apply(self, existing: Transaction) -> Transaction {
        Transaction {
            title: self.title.unwrap_or(existing.title),
            description: match self.description {
                Some(value) => value,
                None => existing.description,
            },
            amount: self.amount.unwrap_or(existing.amount),
            kind: self.kind.unwrap_or(existing.kind),
            category_id: self.category_id.unwrap_or(existing.category_id),
            date: self.date.unwrap_or(existing.date),
            ..existing
        }
    }
}

/// Query string of `GET /transactions/paginated`.
///
/// Everything arrives as text so malformed paging input can fall back to the
/// defaults instead of rejecting the request. Blank values count as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(field: &str, raw: Option<&str>) -> AppResult<Option<OffsetDateTime>> {
    raw.map(|s| {
        OffsetDateTime::parse(s, &Rfc3339)
            .map_err(|_| AppError::Validation(format!("{field} must be an RFC 3339 timestamp")))
    })
    .transpose()
}

impl TransactionPageQuery {
    /// Split into raw page, raw limit and the filter fields.
    pub fn into_parts(self, cfg: &PaginationConfig) -> AppResult<(i64, i64, TransactionFilters)> {
        let page = parse_param(self.page.as_deref(), cfg.default_page);
        let limit = parse_param(self.limit.as_deref(), cfg.default_limit);

        let kind = match non_blank(&self.kind) {
            None => None,
            Some("income") => Some(TransactionType::Income),
            Some("outcome") => Some(TransactionType::Outcome),
            Some(_) => {
                return Err(AppError::Validation(
                    "type must be \"income\" or \"outcome\"".into(),
                ))
            }
        };

        let category_id = non_blank(&self.category_id)
            .map(|s| {
                Uuid::parse_str(s)
                    .map_err(|_| AppError::Validation("categoryId must be a UUID".into()))
            })
            .transpose()?;

        let filters = TransactionFilters {
            title: self.title.filter(|t| !t.is_empty()),
            kind,
            category_id,
            start_date: parse_date("startDate", non_blank(&self.start_date))?,
            end_date: parse_date("endDate", non_blank(&self.end_date))?,
        };

        Ok((page, limit, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn stored() -> Transaction {
        let at = datetime!(2025-04-01 12:00 UTC);
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            title: "Groceries".into(),
            description: Some("weekly shop".into()),
            amount: 82.5,
            kind: TransactionType::Outcome,
            date: at,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let before = stored();
        let patch: TransactionPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(patch.apply(before.clone()), before);
    }

    #[test]
    fn omitted_fields_survive_a_partial_patch() {
        let before = stored();
        let patch: TransactionPatch = serde_json::from_str(r#"{"amount": 90.0}"#).unwrap();
        let after = patch.apply(before.clone());
        assert_eq!(after.amount, 90.0);
        assert_eq!(after.title, before.title);
        assert_eq!(after.description, before.description);
        assert_eq!(after.kind, before.kind);
        assert_eq!(after.category_id, before.category_id);
        assert_eq!(after.date, before.date);
    }

    #[test]
    fn null_description_clears_but_omission_keeps() {
        let cleared: TransactionPatch =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.apply(stored()).description, None);

        let omitted: TransactionPatch = serde_json::from_str(r#"{"title": "Food"}"#).unwrap();
        assert_eq!(omitted.description, None);
        assert_eq!(
            omitted.apply(stored()).description.as_deref(),
            Some("weekly shop")
        );
    }

    #[test]
    fn empty_description_is_stored_as_given() {
        let patch: TransactionPatch = serde_json::from_str(r#"{"description": ""}"#).unwrap();
        assert_eq!(patch.apply(stored()).description.as_deref(), Some(""));
    }

    #[test]
    fn null_on_required_fields_keeps_stored_value() {
        let patch: TransactionPatch =
            serde_json::from_str(r#"{"title": null, "amount": null, "type": null}"#).unwrap();
        let before = stored();
        assert_eq!(patch.apply(before.clone()), before);
    }

    #[test]
    fn patch_validation_rejects_blank_title() {
        let patch: TransactionPatch = serde_json::from_str(r#"{"title": "   "}"#).unwrap();
        assert!(matches!(patch.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn create_request_parses_and_trims() {
        let req: CreateTransactionRequest = serde_json::from_str(&format!(
            r#"{{"title": "  Salary ", "amount": 1000, "type": "income", "categoryId": "{}"}}"#,
            Uuid::nil()
        ))
        .unwrap();
        let req = req.validate().unwrap();
        assert_eq!(req.title, "Salary");
        assert_eq!(req.kind, TransactionType::Income);
        assert_eq!(req.date, None);
    }

    #[test]
    fn page_query_falls_back_on_garbage_paging() {
        let q = TransactionPageQuery {
            page: Some("abc".into()),
            limit: Some("".into()),
            ..Default::default()
        };
        let (page, limit, filters) = q.into_parts(&PaginationConfig::default()).unwrap();
        assert_eq!((page, limit), (1, 10));
        assert_eq!(filters, TransactionFilters::default());
    }

    #[test]
    fn page_query_parses_filters() {
        let category = Uuid::new_v4();
        let q = TransactionPageQuery {
            page: Some("2".into()),
            limit: Some("25".into()),
            title: Some("rent".into()),
            kind: Some("outcome".into()),
            category_id: Some(category.to_string()),
            start_date: Some("2025-01-01T00:00:00Z".into()),
            end_date: Some(" ".into()),
        };
        let (page, limit, filters) = q.into_parts(&PaginationConfig::default()).unwrap();
        assert_eq!((page, limit), (2, 25));
        assert_eq!(filters.title.as_deref(), Some("rent"));
        assert_eq!(filters.kind, Some(TransactionType::Outcome));
        assert_eq!(filters.category_id, Some(category));
        assert_eq!(filters.start_date, Some(datetime!(2025-01-01 0:00 UTC)));
        assert_eq!(filters.end_date, None);
    }

    #[test]
    fn page_query_rejects_bad_filter_values() {
        let bad_type = TransactionPageQuery {
            kind: Some("transfer".into()),
            ..Default::default()
        };
        assert!(bad_type.into_parts(&PaginationConfig::default()).is_err());

        let bad_date = TransactionPageQuery {
            start_date: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(bad_date.into_parts(&PaginationConfig::default()).is_err());
    }

    #[test]
    fn response_uses_camel_case_and_rfc3339() {
        let json = serde_json::to_value(TransactionResponse::from(stored())).unwrap();
        assert_eq!(json["type"], "outcome");
        assert_eq!(json["date"], "2025-04-01T12:00:00Z");
        assert!(json.get("categoryId").is_some());
        assert!(json.get("category").is_none());
    }
}
