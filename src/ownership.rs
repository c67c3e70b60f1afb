//! Ownership checks shared by the category and transaction services.
use std::future::Future;

use tracing::warn;
use uuid::Uuid;

use crate::categories::repo_types::Category;
use crate::error::{AppError, AppResult};
use crate::transactions::repo_types::Transaction;

/// A record that belongs to exactly one user.
pub trait Owned {
    /// Name used in "not found" messages.
    const RESOURCE: &'static str;

    fn owner_id(&self) -> Uuid;
}

impl Owned for Category {
    const RESOURCE: &'static str = "category";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for Transaction {
    const RESOURCE: &'static str = "transaction";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// Fetch `id` and make sure `caller` owns it.
///
/// Fails with [`AppError::NotFound`] when nothing has that id and with
/// [`AppError::Forbidden`] when someone else owns it. `action` completes the
/// sentence "you don't have permission to ...". On success the fetched record
/// is handed back so callers don't read it twice.
pub async fn ensure_owned<R, F, Fut>(
    id: Uuid,
    caller: Uuid,
    action: &'static str,
    fetch_by_id: F,
) -> AppResult<R>
where
    R: Owned,
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = anyhow::Result<Option<R>>>,
{
    let resource = fetch_by_id(id)
        .await?
        .ok_or(AppError::NotFound(R::RESOURCE))?;

    if resource.owner_id() != caller {
        warn!(resource = R::RESOURCE, %id, %caller, "ownership check failed");
        return Err(AppError::Forbidden(action));
    }

    Ok(resource)
}
