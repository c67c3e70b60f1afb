mod app;
mod auth;
mod categories;
mod config;
mod db;
mod error;
mod extract;
mod memory;
mod ownership;
mod state;
mod transactions;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fintrack=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init().await?;
    tracing::info!(
        storage = ?state.config.storage,
        max_page_size = state.config.pagination.max_limit,
        "state initialised"
    );

    app::serve(app::build_app(state)).await
}
