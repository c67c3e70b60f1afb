use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    categories::{
        dto::{CategoryPatch, CreateCategoryRequest},
        repo::CategoryRepo,
        repo_types::{Category, NewCategory},
    },
    error::AppResult,
    ownership::ensure_owned,
    state::AppState,
    transactions::{
        filter::TransactionFilter,
        repo::TransactionRepo,
        repo_types::TransactionWithCategory,
    },
};

#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepo>,
    transactions: Arc<dyn TransactionRepo>,
}

impl FromRef<AppState> for CategoryService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.categories.clone(), state.transactions.clone())
    }
}

/// A category together with every transaction filed under it.
#[derive(Debug)]
pub struct CategoryWithTransactions {
    pub category: Category,
    pub transactions: Vec<TransactionWithCategory>,
    pub transaction_count: i64,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryRepo>, transactions: Arc<dyn TransactionRepo>) -> Self {
        Self {
            categories,
            transactions,
        }
    }

    pub async fn list_categories(&self, user_id: Uuid) -> AppResult<Vec<Category>> {
        Ok(self.categories.find_by_user(user_id).await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create_category(
        &self,
        user_id: Uuid,
        request: CreateCategoryRequest,
    ) -> AppResult<Category> {
        let request = request.validate()?;
        let category = self
            .categories
            .create(NewCategory {
                user_id,
                name: request.name,
                color: request.color,
                icon: request.icon,
                description: request.description,
            })
            .await?;
        info!(category_id = %category.id, %user_id, "category created");
        Ok(category)
    }

    pub async fn find_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        action: &'static str,
    ) -> AppResult<Category> {
        ensure_owned(id, user_id, action, |id| self.categories.find_by_id(id)).await
    }

    #[instrument(skip(self))]
    pub async fn get_category(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> AppResult<CategoryWithTransactions> {
        let category = self.find_owned(id, user_id, "view this category").await?;

        let filter = TransactionFilter::for_user(user_id).with_category(id);
        let (transactions, transaction_count) = tokio::try_join!(
            self.transactions.find_many(&filter, None),
            self.transactions.count(&filter),
        )?;

        Ok(CategoryWithTransactions {
            category,
            transactions,
            transaction_count,
        })
    }

    #[instrument(skip(self, patch))]
    pub async fn update_category(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: CategoryPatch,
    ) -> AppResult<Category> {
        let patch = patch.validate()?;
        let existing = self.find_owned(id, user_id, "update this category").await?;
        let category = self.categories.update(&patch.apply(existing)).await?;
        info!(category_id = %id, "category updated");
        Ok(category)
    }

    /// Delete the category and every transaction filed under it, all or
    /// nothing. Returns how many transactions went with it.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid, user_id: Uuid) -> AppResult<u64> {
        self.find_owned(id, user_id, "delete this category").await?;
        let removed = self.categories.delete_with_transactions(id).await?;
        info!(category_id = %id, removed_transactions = removed, "category deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::memory::MemoryStore;
    use crate::transactions::repo_types::{NewTransaction, TransactionType};

    fn food() -> CreateCategoryRequest {
        CreateCategoryRequest {
            name: "Food".into(),
            color: Some("#00aa00".into()),
            icon: None,
            description: None,
        }
    }

    async fn seed_transactions(store: &MemoryStore, user_id: Uuid, category_id: Uuid, n: usize) {
        for i in 0..n {
            TransactionRepo::create(
                store,
                NewTransaction {
                    user_id,
                    category_id,
                    title: format!("purchase {i}"),
                    description: None,
                    amount: 10.0,
                    kind: TransactionType::Outcome,
                    date: None,
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn owner_sees_category_with_its_transactions() {
        let (state, store) = AppState::fake_with_store();
        let svc = CategoryService::from_ref(&state);
        let owner = Uuid::new_v4();
        let category = svc.create_category(owner, food()).await.unwrap();
        seed_transactions(&store, owner, category.id, 2).await;

        let details = svc.get_category(category.id, owner).await.unwrap();
        assert_eq!(details.category, category);
        assert_eq!(details.transaction_count, 2);
        assert_eq!(details.transactions.len(), 2);
        assert!(details
            .transactions
            .iter()
            .all(|t| t.category.as_ref() == Some(&category)));
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_caller() {
        let state = AppState::fake();
        let svc = CategoryService::from_ref(&state);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        svc.create_category(alice, food()).await.unwrap();
        svc.create_category(bob, food()).await.unwrap();

        let mine = svc.list_categories(alice).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id, alice);
    }

    #[tokio::test]
    async fn strangers_cannot_read_update_or_delete() {
        let state = AppState::fake();
        let svc = CategoryService::from_ref(&state);
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let category = svc.create_category(owner, food()).await.unwrap();

        let err = svc.get_category(category.id, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let patch = CategoryPatch {
            name: Some("Mine now".into()),
            ..Default::default()
        };
        let err = svc
            .update_category(category.id, stranger, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = svc.delete_category(category.id, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let unchanged = svc.get_category(category.id, owner).await.unwrap();
        assert_eq!(unchanged.category.name, "Food");
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let svc = CategoryService::from_ref(&AppState::fake());
        let err = svc
            .delete_category(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("category")));
    }

    #[tokio::test]
    async fn delete_cascades_to_transactions() {
        let (state, store) = AppState::fake_with_store();
        let svc = CategoryService::from_ref(&state);
        let owner = Uuid::new_v4();
        let doomed = svc.create_category(owner, food()).await.unwrap();
        let kept = svc.create_category(owner, food()).await.unwrap();
        seed_transactions(&store, owner, doomed.id, 3).await;
        seed_transactions(&store, owner, kept.id, 1).await;

        assert_eq!(store.row_counts().await, (2, 4));
        let removed = svc.delete_category(doomed.id, owner).await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(store.row_counts().await, (1, 1));
    }

    #[tokio::test]
    async fn failed_cascade_leaves_everything_in_place() {
        let (state, store) = AppState::fake_with_store();
        let svc = CategoryService::from_ref(&state);
        let owner = Uuid::new_v4();
        let category = svc.create_category(owner, food()).await.unwrap();
        seed_transactions(&store, owner, category.id, 3).await;

        store.fail_next_cascade();
        let err = svc.delete_category(category.id, owner).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.row_counts().await, (1, 3));

        let details = svc.get_category(category.id, owner).await.unwrap();
        assert_eq!(details.transaction_count, 3);
    }

    #[tokio::test]
    async fn update_merges_over_stored_values() {
        let state = AppState::fake();
        let svc = CategoryService::from_ref(&state);
        let owner = Uuid::new_v4();
        let category = svc.create_category(owner, food()).await.unwrap();

        let updated = svc
            .update_category(
                category.id,
                owner,
                CategoryPatch {
                    description: Some(Some("groceries and takeaway".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Food");
        assert_eq!(updated.color.as_deref(), Some("#00aa00"));
        assert_eq!(updated.description.as_deref(), Some("groceries and takeaway"));
    }
}
