use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppResult,
    extract::{Json, Path},
    state::AppState,
    transactions::{
        dto::{
            CreateTransactionRequest, TransactionConnection, TransactionPageQuery,
            TransactionPatch, TransactionResponse,
        },
        services::TransactionService,
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/paginated", get(paginated_transactions))
        .route("/transactions/:id", get(get_transaction))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route(
            "/transactions/:id",
            patch(update_transaction).delete(delete_transaction),
        )
}

#[instrument(skip(transactions))]
pub async fn list_transactions(
    State(transactions): State<TransactionService>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<TransactionResponse>>> {
    let items = transactions.list_transactions(user_id).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

/// GET /transactions/paginated?page=&limit=&title=&type=&categoryId=&startDate=&endDate=
#[instrument(skip(transactions, query))]
pub async fn paginated_transactions(
    State(transactions): State<TransactionService>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<TransactionPageQuery>,
) -> AppResult<Json<TransactionConnection>> {
    let (page, limit, filters) = query.into_parts(transactions.pagination())?;
    let result = transactions
        .paginate(user_id, page, limit, Some(filters))
        .await?;
    Ok(Json(TransactionConnection {
        transactions: result.items.into_iter().map(Into::into).collect(),
        pagination: result.page_info,
    }))
}

#[instrument(skip(transactions))]
pub async fn get_transaction(
    State(transactions): State<TransactionService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TransactionResponse>> {
    Ok(Json(transactions.get_transaction(id, user_id).await?.into()))
}

#[instrument(skip(transactions, payload))]
pub async fn create_transaction(
    State(transactions): State<TransactionService>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTransactionRequest>,
) -> AppResult<(StatusCode, Json<TransactionResponse>)> {
    let created = transactions.create_transaction(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[instrument(skip(transactions, payload))]
pub async fn update_transaction(
    State(transactions): State<TransactionService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransactionPatch>,
) -> AppResult<Json<TransactionResponse>> {
    let updated = transactions.update_transaction(id, user_id, payload).await?;
    Ok(Json(updated.into()))
}

#[instrument(skip(transactions))]
pub async fn delete_transaction(
    State(transactions): State<TransactionService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    transactions.delete_transaction(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
