use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::filter::TransactionFilter;
use super::pagination::PageWindow;
use super::repo_types::{NewTransaction, Transaction, TransactionWithCategory};
use crate::categories::repo_types::Category;

/// Persistence for transactions.
#[async_trait]
pub trait TransactionRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Transaction>>;

    /// Matching transactions, newest `date` first, each with its category.
    ///
    /// `window` bounds the read; `None` returns every match.
    async fn find_many(
        &self,
        filter: &TransactionFilter,
        window: Option<PageWindow>,
    ) -> anyhow::Result<Vec<TransactionWithCategory>>;

    async fn count(&self, filter: &TransactionFilter) -> anyhow::Result<i64>;
    async fn create(&self, new: NewTransaction) -> anyhow::Result<Transaction>;
    /// Overwrites every mutable column with the values in `transaction`.
    async fn update(&self, transaction: &Transaction) -> anyhow::Result<Transaction>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgTransactionRepo {
    db: PgPool,
}

impl PgTransactionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn categories_by_id(&self, ids: Vec<Uuid>) -> anyhow::Result<HashMap<Uuid, Category>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, user_id, name, color, icon, description, created_at, updated_at
              FROM categories
             WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("load categories for transactions")?;
        Ok(rows.into_iter().map(|c| (c.id, c)).collect())
    }
}

const TRANSACTION_COLUMNS: &str =
    "id, user_id, category_id, title, description, amount, type, date, created_at, updated_at";

/// Render the predicate as a `WHERE` clause.
///
/// Title matching uses `strpos` so `%` and `_` in the search text are taken
/// literally, mirroring `str::contains` in the in-memory store.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    qb.push(" WHERE user_id = ").push_bind(filter.user_id);
    if let Some(title) = &filter.title {
        qb.push(" AND strpos(title, ").push_bind(title.clone()).push(") > 0");
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND type = ").push_bind(kind);
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND date <= ").push_bind(end);
    }
}

#[async_trait]
impl TransactionRepo for PgTransactionRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find transaction by id")?;
        Ok(row)
    }

    async fn find_many(
        &self,
        filter: &TransactionFilter,
        window: Option<PageWindow>,
    ) -> anyhow::Result<Vec<TransactionWithCategory>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions"
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY date DESC, id DESC");
        if let Some(w) = window {
            qb.push(" LIMIT ").push_bind(w.limit);
            qb.push(" OFFSET ").push_bind(w.offset);
        }

        let rows: Vec<Transaction> = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .context("list transactions")?;

        let mut ids: Vec<Uuid> = rows.iter().map(|t| t.category_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let categories = self.categories_by_id(ids).await?;

        Ok(rows
            .into_iter()
            .map(|transaction| {
                let category = categories.get(&transaction.category_id).cloned();
                TransactionWithCategory {
                    transaction,
                    category,
                }
            })
            .collect())
    }

    async fn count(&self, filter: &TransactionFilter) -> anyhow::Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_filter(&mut qb, filter);
        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.db)
            .await
            .context("count transactions")?;
        Ok(total)
    }

    async fn create(&self, new: NewTransaction) -> anyhow::Result<Transaction> {
        let row = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions
                (id, user_id, category_id, title, description, amount, type, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, now()))
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.category_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.amount)
        .bind(new.kind)
        .bind(new.date)
        .fetch_one(&self.db)
        .await
        .context("insert transaction")?;
        Ok(row)
    }

    async fn update(&self, transaction: &Transaction) -> anyhow::Result<Transaction> {
        let row = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
               SET category_id = $2, title = $3, description = $4, amount = $5,
                   type = $6, date = $7, updated_at = $8
             WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction.id)
        .bind(transaction.category_id)
        .bind(&transaction.title)
        .bind(&transaction.description)
        .bind(transaction.amount)
        .bind(transaction.kind)
        .bind(transaction.date)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await
        .context("update transaction")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete transaction")?;
        Ok(())
    }
}
