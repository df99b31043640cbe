//! HTTP surface: order placement, lookup and status changes.
//!
//! The upstream gateway authenticates callers and forwards the resolved
//! identity in `x-actor-id` / `x-actor-role`.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Order, OrderStatus, RequestedItem, UnknownStatus};
use crate::domain::value_objects::{Actor, ActorRole};
use crate::ledger::OrderLedger;
use crate::services::{OrderCreationPipeline, StatusTransitionService};
use crate::OrderError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub creation: Arc<OrderCreationPipeline>,
    pub transitions: Arc<StatusTransitionService>,
    pub ledger: Arc<dyn OrderLedger>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-orders"})) }))
        .route("/api/v1/orders", post(create_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/status", patch(update_status))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

/// Caller identity as resolved by the auth layer in front of this service.
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
        let unauthorized = || (StatusCode::UNAUTHORIZED, "Please sign in to continue.".to_string());
        let id = header(ACTOR_ID_HEADER).and_then(|v| Uuid::parse_str(v).ok()).ok_or_else(unauthorized)?;
        let role = header(ACTOR_ROLE_HEADER).and_then(|v| v.parse::<ActorRole>().ok()).ok_or_else(unauthorized)?;
        Ok(Self(Actor::new(id, role)))
    }
}

/// Maps the error taxonomy to what the caller is allowed to see.
pub fn reject(e: OrderError) -> ApiError {
    let (code, message) = match &e {
        OrderError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "One of the products in your order no longer exists.".to_string()),
        OrderError::ProductUnavailable { product_name, .. } => (StatusCode::CONFLICT, format!("{product_name} is currently unavailable.")),
        OrderError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "Order not found.".to_string()),
        OrderError::EmptyOrder => (StatusCode::UNPROCESSABLE_ENTITY, "Your order has no items.".to_string()),
        OrderError::NoOpTransition(status) => (StatusCode::CONFLICT, format!("The order is already {}.", human(*status))),
        OrderError::IllegalTransition { to, .. } => (StatusCode::FORBIDDEN, format!("You cannot mark this order as {} right now.", human(*to))),
        OrderError::TransitionConflict(_) => (StatusCode::CONFLICT, "The order was just updated by someone else. Please refresh and try again.".to_string()),
        OrderError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
        OrderError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong. Please try again.".to_string()),
    };
    if code.is_server_error() {
        tracing::error!(error = %e, "request failed");
    } else {
        tracing::debug!(error = %e, "request rejected");
    }
    (code, message)
}

fn human(status: OrderStatus) -> String { status.as_str().replace('_', " ").to_lowercase() }

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<RequestedItem>,
    /// Cart session to check out when `items` is empty; cleared on success.
    pub cart: Option<String>,
}

async fn create_order(State(s): State<AppState>, AuthenticatedActor(actor): AuthenticatedActor, Json(r): Json<CreateOrderRequest>) -> Result<(StatusCode, Json<Order>), ApiError> {
    if actor.role != ActorRole::Client {
        return Err((StatusCode::FORBIDDEN, "Only customers can place orders.".to_string()));
    }
    let order = match (r.items.is_empty(), r.cart.as_deref()) {
        (true, Some(cart)) => s.creation.checkout_cart(actor.id, cart).await,
        (_, cart) => s.creation.create_order(actor.id, &r.items, cart).await,
    }
    .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(State(s): State<AppState>, AuthenticatedActor(_): AuthenticatedActor, Path(id): Path<Uuid>) -> Result<Json<Order>, ApiError> {
    s.ledger.find_order(id).await.map_err(reject)?.map(Json).ok_or_else(|| reject(OrderError::OrderNotFound(id)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

async fn update_status(State(s): State<AppState>, AuthenticatedActor(actor): AuthenticatedActor, Path(id): Path<Uuid>, Json(r): Json<UpdateStatusRequest>) -> Result<Json<Order>, ApiError> {
    r.validate().map_err(|e| reject(e.into()))?;
    let next: OrderStatus = r.status.parse().map_err(|e: UnknownStatus| reject(OrderError::Validation(e.to_string())))?;
    let note = r.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let order = s.transitions.transition(id, next, note, actor).await.map_err(reject)?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CatalogProduct, MemoryCartStore};
    use crate::domain::value_objects::Money;
    use crate::ledger::{MemoryCatalog, MemoryLedger};
    use crate::notifications::{LogPushGateway, MemoryRecipientDirectory, NotificationDispatcher};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Harness { app: Router, catalog: MemoryCatalog, ledger: MemoryLedger }

    fn harness() -> Harness {
        let (ledger, catalog) = (MemoryLedger::new(), MemoryCatalog::new());
        let dispatcher = NotificationDispatcher::new(Arc::new(MemoryRecipientDirectory::new()), Arc::new(LogPushGateway));
        let state = AppState {
            creation: Arc::new(OrderCreationPipeline::new(Arc::new(ledger.clone()), Arc::new(catalog.clone()), Arc::new(MemoryCartStore::new()))),
            transitions: Arc::new(StatusTransitionService::new(Arc::new(ledger.clone()), Arc::new(dispatcher))),
            ledger: Arc::new(ledger.clone()),
        };
        Harness { app: router(state), catalog, ledger }
    }

    fn request(method: &str, uri: &str, actor: Option<Actor>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
        if let Some(a) = actor {
            builder = builder.header(ACTOR_ID_HEADER, a.id.to_string()).header(ACTOR_ROLE_HEADER, a.role.as_str());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        (status, to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec())
    }

    #[tokio::test]
    async fn test_place_then_confirm() {
        let h = harness();
        let p = CatalogProduct::new(Uuid::new_v4(), Uuid::new_v4(), "Fried Plantain", Money::from_minor(1500));
        h.catalog.insert(p.clone()).await;
        let client = Actor::client(Uuid::new_v4());

        let body = serde_json::json!({"items": [{"product_id": p.id, "quantity": 2}]});
        let (code, bytes) = send(&h.app, request("POST", "/api/v1/orders", Some(client), body)).await;
        assert_eq!(code, StatusCode::CREATED);
        let order: Order = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(order.total, Money::from_minor(3000));
        assert_eq!(order.user_id, client.id);

        let uri = format!("/api/v1/orders/{}/status", order.id);
        let business = Actor::business(Uuid::new_v4());
        let (code, bytes) = send(&h.app, request("PATCH", &uri, Some(business), serde_json::json!({"status": "confirmed"}))).await;
        assert_eq!(code, StatusCode::OK);
        let order: Order = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_errors_are_user_facing() {
        let h = harness();
        let p = CatalogProduct::new(Uuid::new_v4(), Uuid::new_v4(), "Egusi", Money::from_minor(4000)).unavailable();
        h.catalog.insert(p.clone()).await;
        let client = Actor::client(Uuid::new_v4());

        let body = serde_json::json!({"items": [{"product_id": p.id, "quantity": 1}]});
        let (code, bytes) = send(&h.app, request("POST", "/api/v1/orders", Some(client), body)).await;
        assert_eq!(code, StatusCode::CONFLICT);
        assert_eq!(String::from_utf8(bytes).unwrap(), "Egusi is currently unavailable.");
        assert_eq!(h.ledger.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_forbidden() {
        let h = harness();
        let mut order = Order::placeholder(Uuid::new_v4());
        order.status = OrderStatus::Confirmed;
        h.ledger.insert(order.clone()).await;

        let uri = format!("/api/v1/orders/{}/status", order.id);
        let (code, _) = send(&h.app, request("PATCH", &uri, Some(Actor::client(order.user_id)), serde_json::json!({"status": "CANCELLED"}))).await;
        assert_eq!(code, StatusCode::FORBIDDEN);
        let (code, _) = send(&h.app, request("PATCH", &uri, Some(Actor::client(order.user_id)), serde_json::json!({"status": "teleported"}))).await;
        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_requires_actor_headers() {
        let h = harness();
        let (code, _) = send(&h.app, request("POST", "/api/v1/orders", None, serde_json::json!({"items": []}))).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
        let (code, _) = send(&h.app, request("POST", "/api/v1/orders", Some(Actor::delivery(Uuid::new_v4())), serde_json::json!({"items": []}))).await;
        assert_eq!(code, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_storage_errors_are_masked() {
        let (code, msg) = reject(OrderError::StorageError("connection reset by peer".into()));
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!msg.contains("connection"));
        let (_, msg) = reject(OrderError::NoOpTransition(OrderStatus::ReadyForPickup));
        assert_eq!(msg, "The order is already ready for pickup.");
    }
}
