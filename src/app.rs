use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, categories, transactions, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(categories::router())
                .merge(transactions::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "name": "Test", "email": email, "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_category(app: &Router, token: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/v1/categories",
            Some(token),
            Some(json!({ "name": "Salary" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/v1/transactions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/v1/me",
            Some("not-a-jwt"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn paginated_listing_end_to_end() {
        let app = build_app(AppState::fake());
        let token = register(&app, "owner@example.com").await;
        let category = create_category(&app, &token).await;

        for i in 0..12 {
            let (status, _) = call(
                &app,
                Method::POST,
                "/api/v1/transactions",
                Some(&token),
                Some(json!({
                    "title": format!("pay {i}"),
                    "amount": 100.0 + i as f64,
                    "type": if i < 5 { "income" } else { "outcome" },
                    "categoryId": category,
                    "date": format!("2025-02-{:02}T08:00:00Z", i + 1),
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/transactions/paginated?page=2&limit=5",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 5);
        assert_eq!(body["transactions"][0]["title"], "pay 6");
        assert_eq!(body["transactions"][0]["category"]["name"], "Salary");
        assert_eq!(
            body["pagination"],
            json!({
                "currentPage": 2,
                "totalPages": 3,
                "totalItems": 12,
                "itemsPerPage": 5,
                "hasNextPage": true,
                "hasPreviousPage": true,
            })
        );

        let (_, body) = call(
            &app,
            Method::GET,
            "/api/v1/transactions/paginated?type=income&limit=abc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["pagination"]["totalItems"], 5);
        assert_eq!(body["pagination"]["itemsPerPage"], 10);

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/transactions/paginated?type=refund",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn other_users_records_are_forbidden() {
        let app = build_app(AppState::fake());
        let owner = register(&app, "owner@example.com").await;
        let stranger = register(&app, "stranger@example.com").await;
        let category = create_category(&app, &owner).await;

        let uri = format!("/api/v1/categories/{category}");
        let (status, body) = call(&app, Method::DELETE, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/v1/categories/{}", uuid::Uuid::new_v4()),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deletedTransactions"], 0);
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let app = build_app(AppState::fake());
        let token = register(&app, "owner@example.com").await;

        for uri in [
            "/api/v1/transactions/not-a-uuid",
            "/api/v1/categories/42",
            "/api/v1/categories/nope/transactions",
        ] {
            let (status, body) = call(&app, Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"], "not_found", "{uri}");
        }

        let (status, body) = call(
            &app,
            Method::DELETE,
            "/api/v1/transactions/not-a-uuid",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn unreadable_bodies_are_validation_errors() {
        let app = build_app(AppState::fake());
        let token = register(&app, "owner@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(&token),
            Some(json!({ "amount": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        assert!(body["message"].as_str().unwrap().contains("title"));

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "x@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn fractional_page_is_the_first_page() {
        let app = build_app(AppState::fake());
        let token = register(&app, "owner@example.com").await;
        let category = create_category(&app, &token).await;

        for i in 0..27 {
            call(
                &app,
                Method::POST,
                "/api/v1/transactions",
                Some(&token),
                Some(json!({
                    "title": format!("t{i}"),
                    "amount": 1,
                    "type": "outcome",
                    "categoryId": category,
                })),
            )
            .await;
        }

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/transactions/paginated?page=2.7&limit=10",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["currentPage"], 1);
        assert_eq!(body["pagination"]["hasPreviousPage"], false);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn patch_keeps_fields_the_body_omits() {
        let app = build_app(AppState::fake());
        let token = register(&app, "owner@example.com").await;
        let category = create_category(&app, &token).await;

        let (_, created) = call(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(&token),
            Some(json!({
                "title": "Bonus",
                "description": "Q1",
                "amount": 500,
                "type": "income",
                "categoryId": category,
            })),
        )
        .await;
        let uri = format!("/api/v1/transactions/{}", created["id"].as_str().unwrap());

        let (status, updated) = call(
            &app,
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "amount": 650 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["amount"], 650.0);
        assert_eq!(updated["title"], "Bonus");
        assert_eq!(updated["description"], "Q1");
        assert_eq!(updated["date"], created["date"]);

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
