use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    categories::repo::CategoryRepo,
    config::PaginationConfig,
    error::{AppError, AppResult},
    ownership::ensure_owned,
    state::AppState,
    transactions::{
        dto::{CreateTransactionRequest, TransactionPatch},
        filter::{build_filter, TransactionFilter, TransactionFilters},
        pagination::{PageInfo, PageWindow},
        repo::TransactionRepo,
        repo_types::{NewTransaction, Transaction, TransactionWithCategory},
    },
};

#[derive(Clone)]
pub struct TransactionService {
    transactions: Arc<dyn TransactionRepo>,
    categories: Arc<dyn CategoryRepo>,
    pagination: PaginationConfig,
}

impl FromRef<AppState> for TransactionService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.transactions.clone(),
            state.categories.clone(),
            state.config.pagination.clone(),
        )
    }
}

/// One page of transactions plus its metadata.
#[derive(Debug)]
pub struct TransactionPage {
    pub items: Vec<TransactionWithCategory>,
    pub page_info: PageInfo,
}

impl TransactionService {
    pub fn new(
        transactions: Arc<dyn TransactionRepo>,
        categories: Arc<dyn CategoryRepo>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            transactions,
            categories,
            pagination,
        }
    }

    pub fn pagination(&self) -> &PaginationConfig {
        &self.pagination
    }

    async fn find_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        action: &'static str,
    ) -> AppResult<Transaction> {
        ensure_owned(id, user_id, action, |id| self.transactions.find_by_id(id)).await
    }

    /// The category a transaction is filed under must belong to the same user.
    async fn check_category(&self, category_id: Uuid, user_id: Uuid) -> AppResult<()> {
        ensure_owned(category_id, user_id, "use this category", |id| {
            self.categories.find_by_id(id)
        })
        .await
        .map(|_| ())
    }

    async fn with_category(&self, transaction: Transaction) -> AppResult<TransactionWithCategory> {
        let category = self.categories.find_by_id(transaction.category_id).await?;
        Ok(TransactionWithCategory {
            transaction,
            category,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn create_transaction(
        &self,
        user_id: Uuid,
        request: CreateTransactionRequest,
    ) -> AppResult<TransactionWithCategory> {
        let request = request.validate()?;
        self.check_category(request.category_id, user_id).await?;

        let transaction = self
            .transactions
            .create(NewTransaction {
                user_id,
                category_id: request.category_id,
                title: request.title,
                description: request.description,
                amount: request.amount,
                kind: request.kind,
                date: request.date,
            })
            .await?;
        info!(transaction_id = %transaction.id, %user_id, "transaction created");
        self.with_category(transaction).await
    }

    pub async fn list_transactions(
        &self,
        user_id: Uuid,
    ) -> AppResult<Vec<TransactionWithCategory>> {
        Ok(self
            .transactions
            .find_many(&TransactionFilter::for_user(user_id), None)
            .await?)
    }

    /// Every transaction filed under a category the caller owns.
    pub async fn list_by_category(
        &self,
        category_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<TransactionWithCategory>> {
        ensure_owned(category_id, user_id, "view this category", |id| {
            self.categories.find_by_id(id)
        })
        .await?;
        let filter = TransactionFilter::for_user(user_id).with_category(category_id);
        Ok(self.transactions.find_many(&filter, None).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> AppResult<TransactionWithCategory> {
        let transaction = self.find_owned(id, user_id, "view this transaction").await?;
        self.with_category(transaction).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: TransactionPatch,
    ) -> AppResult<TransactionWithCategory> {
        let patch = patch.validate()?;
        let existing = self.find_owned(id, user_id, "update this transaction").await?;

        if let Some(category_id) = patch.category_id {
            if category_id != existing.category_id {
                self.check_category(category_id, user_id).await?;
            }
        }

        let transaction = self.transactions.update(&patch.apply(existing)).await?;
        info!(transaction_id = %id, "transaction updated");
        self.with_category(transaction).await
    }

    #[instrument(skip(self))]
    pub async fn delete_transaction(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.find_owned(id, user_id, "delete this transaction").await?;
        self.transactions.delete(id).await?;
        info!(transaction_id = %id, "transaction deleted");
        Ok(())
    }

    /// Filtered, newest-first page of the caller's transactions.
    ///
    /// `page` and `limit` are clamped, never rejected. A page past the end
    /// comes back empty with the metadata still describing the full result.
    #[instrument(skip(self, filters))]
    pub async fn paginate(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
        filters: Option<TransactionFilters>,
    ) -> AppResult<TransactionPage> {
        let window = PageWindow::normalize(page, limit, self.pagination.max_limit);
        let filter = build_filter(user_id, filters);

        let (total_items, items) = tokio::try_join!(
            self.transactions.count(&filter),
            self.transactions.find_many(&filter, Some(window)),
        )
        .map_err(AppError::Internal)?;

        let page_info = PageInfo::new(window, total_items);
        debug!(
            page = page_info.current_page,
            limit = page_info.items_per_page,
            total_items,
            returned = items.len(),
            "transaction page"
        );
        Ok(TransactionPage { items, page_info })
    }
}
