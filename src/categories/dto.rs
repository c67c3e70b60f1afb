use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    categories::repo_types::Category,
    error::{AppError, AppResult},
    transactions::dto::{double_option, TransactionResponse},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            name: c.name,
            color: c.color,
            icon: c.icon,
            description: c.description,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// A single category with the transactions filed under it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetails {
    #[serde(flatten)]
    pub category: CategoryResponse,
    pub transactions: Vec<TransactionResponse>,
    pub transaction_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCategoryResponse {
    pub id: Uuid,
    pub deleted_transactions: u64,
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".into()));
    }
    Ok(name.to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

impl CreateCategoryRequest {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            name: validate_name(&self.name)?,
            ..self
        })
    }
}

/// Partial update of a category. Omitted fields keep their stored value and
/// `null` clears one of the optional ones.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl CategoryPatch {
    pub fn validate(self) -> AppResult<Self> {
        Ok(Self {
            name: self.name.as_deref().map(validate_name).transpose()?,
            ..self
        })
    }

    pub fn apply(self, existing: Category) -> Category {
        Category {
            name: self.name.unwrap_or(existing.name),
            color: self.color.unwrap_or(existing.color),
            icon: self.icon.unwrap_or(existing.icon),
            description: self.description.unwrap_or(existing.description),
            ..existing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> Category {
        let now = OffsetDateTime::now_utc();
        Category {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Food".into(),
            color: Some("#ff8800".into()),
            icon: Some("utensils".into()),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let before = stored();
        let patch: CategoryPatch =
            serde_json::from_str(r#"{"description": "eating out", "icon": null}"#).unwrap();
        let after = patch.apply(before.clone());
        assert_eq!(after.name, before.name);
        assert_eq!(after.color, before.color);
        assert_eq!(after.icon, None);
        assert_eq!(after.description.as_deref(), Some("eating out"));
    }

    #[test]
    fn blank_names_are_rejected() {
        let req = CreateCategoryRequest {
            name: "  ".into(),
            color: None,
            icon: None,
            description: None,
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        let patch = CategoryPatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn details_flatten_the_category() {
        let details = CategoryDetails {
            category: stored().into(),
            transactions: vec![],
            transaction_count: 0,
        };
        let json = serde_json::to_value(details).unwrap();
        assert_eq!(json["name"], "Food");
        assert_eq!(json["transactionCount"], 0);
        assert!(json["transactions"].as_array().unwrap().is_empty());
    }
}
