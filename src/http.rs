//! REST surface. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /api/orders/create` — guest checkout. 201 `{ order, orderNumber }`.
//! - `POST /api/stripe/webhook` — raw body + `stripe-signature` header;
//!   400 on verification failure, `{ "received": true }` otherwise.
//! - `GET /api/orders/:order_number` — fetch one order.
//! - `PUT /api/orders/:order_number/status` — admin status update.
//! - `DELETE /api/orders/:order_number` — explicit admin delete.
//! - `GET /health` — health check.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::checkout::CheckoutService;
use crate::error::StoreError;
use crate::order::OrderStatus;
use crate::store::OrderStore;
use crate::webhook::WebhookHandler;

pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub webhook: WebhookHandler,
    pub orders: Arc<OrderStore>,
}

/// Build the axum `Router` for the order flow.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/orders/create", post(create_order_handler))
        .route(
            "/api/orders/:order_number",
            get(get_order_handler).delete(delete_order_handler),
        )
        .route("/api/orders/:order_number/status", put(update_status_handler))
        .route("/api/stripe/webhook", post(webhook_handler))
        .with_state(state)
}

/// Serve the order flow over HTTP at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<(), std::io::Error> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// `POST /api/orders/create` — synchronous guest checkout.
async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    match state.checkout.place(payload) {
        Ok(order) => {
            let order_number = order.order_number.clone();
            (
                StatusCode::CREATED,
                Json(json!({ "order": order, "orderNumber": order_number })),
            )
                .into_response()
        }
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// `POST /api/stripe/webhook` — provider-signed event delivery, raw body.
async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    match state.webhook.handle(&body, signature) {
        Ok(_) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> impl IntoResponse {
    match state.orders.get(&order_number) {
        Ok(Some(order)) => (StatusCode::OK, Json(json!({ "order": order }))).into_response(),
        Ok(None) => not_found(&order_number),
        Err(e) => store_failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: OrderStatus,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    actor: Option<String>,
}

/// `PUT /api/orders/:order_number/status` — admin status update. Any status
/// may be set from any status; the transition always lands in the history
/// log.
async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> impl IntoResponse {
    let result = state.orders.update(&order_number, |order| {
        order.set_status(update.status, update.note.clone(), update.actor.clone());
    });
    match result {
        Ok(Some(order)) => (StatusCode::OK, Json(json!({ "order": order }))).into_response(),
        Ok(None) => not_found(&order_number),
        Err(e) => store_failure(e),
    }
}

async fn delete_order_handler(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> impl IntoResponse {
    match state.orders.delete(&order_number) {
        Ok(Some(_)) => (
            StatusCode::OK,
            Json(json!({ "deleted": true, "orderNumber": order_number })),
        )
            .into_response(),
        Ok(None) => not_found(&order_number),
        Err(e) => store_failure(e),
    }
}

fn not_found(order_number: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("order not found: {}", order_number) })),
    )
        .into_response()
}

fn store_failure(err: StoreError) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}
