use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    categories::{
        dto::{
            CategoryDetails, CategoryPatch, CategoryResponse, CreateCategoryRequest,
            DeletedCategoryResponse,
        },
        services::CategoryService,
    },
    error::AppResult,
    extract::{Json, Path},
    state::AppState,
    transactions::{dto::TransactionResponse, services::TransactionService},
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/:id", get(get_category))
        .route("/categories/:id/transactions", get(list_category_transactions))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category))
        .route(
            "/categories/:id",
            patch(update_category).delete(delete_category),
        )
}

#[instrument(skip(categories))]
pub async fn list_categories(
    State(categories): State<CategoryService>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<CategoryResponse>>> {
    let items = categories.list_categories(user_id).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[instrument(skip(categories, payload))]
pub async fn create_category(
    State(categories): State<CategoryService>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<CategoryResponse>)> {
    let category = categories.create_category(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(category.into())))
}

#[instrument(skip(categories))]
pub async fn get_category(
    State(categories): State<CategoryService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CategoryDetails>> {
    let found = categories.get_category(id, user_id).await?;
    Ok(Json(CategoryDetails {
        category: found.category.into(),
        transactions: found.transactions.into_iter().map(Into::into).collect(),
        transaction_count: found.transaction_count,
    }))
}

#[instrument(skip(transactions))]
pub async fn list_category_transactions(
    State(transactions): State<TransactionService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<TransactionResponse>>> {
    let items = transactions.list_by_category(id, user_id).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[instrument(skip(categories, payload))]
pub async fn update_category(
    State(categories): State<CategoryService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryPatch>,
) -> AppResult<Json<CategoryResponse>> {
    let category = categories.update_category(id, user_id, payload).await?;
    Ok(Json(category.into()))
}

#[instrument(skip(categories))]
pub async fn delete_category(
    State(categories): State<CategoryService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedCategoryResponse>> {
    let deleted_transactions = categories.delete_category(id, user_id).await?;
    Ok(Json(DeletedCategoryResponse {
        id,
        deleted_transactions,
    }))
}
