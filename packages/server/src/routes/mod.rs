pub mod mining;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::AppState;

/// Identity of the authenticated admin triggering a mining run.
///
/// Authentication itself happens upstream; the verified admin id reaches
/// this service in the `x-admin-id` header.
#[derive(Debug, Clone, Copy)]
pub struct AdminIdentity(pub Uuid);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/mining", post(mining::mine))
        .layer(middleware::from_fn(require_admin))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn require_admin(mut request: Request, next: Next) -> Response {
    let admin = request
        .headers()
        .get("x-admin-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok());

    match admin {
        Some(id) => {
            request.extensions_mut().insert(AdminIdentity(id));
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "missing or invalid admin identity" })),
        )
            .into_response(),
    }
}
