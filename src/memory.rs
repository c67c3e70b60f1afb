//! In-memory implementation of every repository.
//!
//! Used by the test suite and by `STORAGE_BACKEND=memory` for running the
//! service without PostgreSQL. Data lives for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::categories::{
    repo::CategoryRepo,
    repo_types::{Category, NewCategory},
};
use crate::db::UniqueViolation;
use crate::transactions::{
    filter::TransactionFilter,
    pagination::PageWindow,
    repo::TransactionRepo,
    repo_types::{NewTransaction, Transaction, TransactionWithCategory},
};
use crate::users::{
    repo::UserRepo,
    repo_types::{NewUser, User},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    transactions: HashMap<Uuid, Transaction>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    #[cfg(test)]
    fail_next_cascade: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next category cascade fail after its transactions were staged
    /// for removal, to prove nothing is committed.
    #[cfg(test)]
    pub fn fail_next_cascade(&self) {
        self.fail_next_cascade
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn row_counts(&self) -> (usize, usize) {
        let t = self.tables.read().await;
        (t.categories.len(), t.transactions.len())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(UniqueViolation("users_email_key").into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> anyhow::Result<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(UniqueViolation("users_email_key").into());
        }
        let row = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| anyhow::anyhow!("user {} does not exist", user.id))?;
        *row = User {
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(row.clone())
    }
}

#[async_trait]
impl CategoryRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn create(&self, new: NewCategory) -> anyhow::Result<Category> {
        let now = OffsetDateTime::now_utc();
        let category = Category {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            name: new.name,
            color: new.color,
            icon: new.icon,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .categories
            .insert(category.id, category.clone());
        Ok(category)
    }

    async fn update(&self, category: &Category) -> anyhow::Result<Category> {
        let mut tables = self.tables.write().await;
        let row = tables
            .categories
            .get_mut(&category.id)
            .ok_or_else(|| anyhow::anyhow!("category {} does not exist", category.id))?;
        *row = Category {
            updated_at: OffsetDateTime::now_utc(),
            ..category.clone()
        };
        Ok(row.clone())
    }

    async fn delete_with_transactions(&self, id: Uuid) -> anyhow::Result<u64> {
        let mut tables = self.tables.write().await;

        // Work on a copy and swap it in only when every step succeeded.
        let mut staged = tables.clone();
        let before = staged.transactions.len();
        staged.transactions.retain(|_, t| t.category_id != id);
        let removed = (before - staged.transactions.len()) as u64;

        #[cfg(test)]
        if self
            .fail_next_cascade
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            anyhow::bail!("injected failure after staging {removed} transaction deletes");
        }

        anyhow::ensure!(
            staged.categories.remove(&id).is_some(),
            "category {id} vanished during delete"
        );

        *tables = staged;
        Ok(removed)
    }
}

#[async_trait]
impl TransactionRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Transaction>> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn find_many(
        &self,
        filter: &TransactionFilter,
        window: Option<PageWindow>,
    ) -> anyhow::Result<Vec<TransactionWithCategory>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Transaction> = tables
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        let (skip, take) = match window {
            Some(w) => (w.offset as usize, w.limit as usize),
            None => (0, usize::MAX),
        };

        Ok(rows
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|t| TransactionWithCategory {
                transaction: t.clone(),
                category: tables.categories.get(&t.category_id).cloned(),
            })
            .collect())
    }

    async fn count(&self, filter: &TransactionFilter) -> anyhow::Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .count() as i64)
    }

    async fn create(&self, new: NewTransaction) -> anyhow::Result<Transaction> {
        let mut tables = self.tables.write().await;
        anyhow::ensure!(
            tables.categories.contains_key(&new.category_id),
            "foreign key violation: category {} does not exist",
            new.category_id
        );
        let now = OffsetDateTime::now_utc();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            category_id: new.category_id,
            title: new.title,
            description: new.description,
            amount: new.amount,
            kind: new.kind,
            date: new.date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        tables
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn update(&self, transaction: &Transaction) -> anyhow::Result<Transaction> {
        let mut tables = self.tables.write().await;
        anyhow::ensure!(
            tables.categories.contains_key(&transaction.category_id),
            "foreign key violation: category {} does not exist",
            transaction.category_id
        );
        let row = tables
            .transactions
            .get_mut(&transaction.id)
            .ok_or_else(|| anyhow::anyhow!("transaction {} does not exist", transaction.id))?;
        *row = Transaction {
            updated_at: OffsetDateTime::now_utc(),
            ..transaction.clone()
        };
        Ok(row.clone())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.tables.write().await.transactions.remove(&id);
        Ok(())
    }
}
