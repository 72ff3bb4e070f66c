use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::api::middleware::{trace_layer, MakeRequestUuid, REQUEST_ID_HEADER};
use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/orders", post(handlers::create_order))
        .route("/orders/:id", get(handlers::get_order))
        .route("/orders/:id/cancel", post(handlers::cancel_order))
        .route("/payments/callback", post(handlers::payment_callback))
        .route("/_fake_payments", post(handlers::create_fake_payment))
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .with_state(state)
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(trace_layer())
        .layer(CorsLayer::permissive())
}
