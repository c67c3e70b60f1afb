use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::categories::repo_types::{Category, NewCategory};

/// Persistence for categories.
#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Category>>;
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Category>>;
    async fn create(&self, new: NewCategory) -> anyhow::Result<Category>;
    /// Overwrites every mutable column with the values in `category`.
    async fn update(&self, category: &Category) -> anyhow::Result<Category>;
    /// Deletes the category and all of its transactions as one atomic unit.
    ///
    /// Returns the number of transactions removed alongside the category.
    async fn delete_with_transactions(&self, id: Uuid) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgCategoryRepo {
    db: PgPool,
}

impl PgCategoryRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const CATEGORY_COLUMNS: &str =
    "id, user_id, name, color, icon, description, created_at, updated_at";

#[async_trait]
impl CategoryRepo for PgCategoryRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find category by id")?;
        Ok(row)
    }

    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
              FROM categories
             WHERE user_id = $1
             ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list categories by user")?;
        Ok(rows)
    }

    async fn create(&self, new: NewCategory) -> anyhow::Result<Category> {
        let row = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (id, user_id, name, color, icon, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.name)
        .bind(&new.color)
        .bind(&new.icon)
        .bind(&new.description)
        .fetch_one(&self.db)
        .await
        .context("insert category")?;
        Ok(row)
    }

    async fn update(&self, category: &Category) -> anyhow::Result<Category> {
        let row = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
               SET name = $2, color = $3, icon = $4, description = $5, updated_at = $6
             WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(&category.description)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await
        .context("update category")?;
        Ok(row)
    }

    async fn delete_with_transactions(&self, id: Uuid) -> anyhow::Result<u64> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let removed = sqlx::query("DELETE FROM transactions WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete category transactions")?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete category")?
            .rows_affected();
        anyhow::ensure!(deleted == 1, "category {id} vanished during delete");

        tx.commit().await.context("commit tx")?;
        Ok(removed)
    }
}
