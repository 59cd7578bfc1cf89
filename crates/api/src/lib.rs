//! HTTP surface and process wiring for the order-fulfillment services.
//!
//! The router is deliberately thin: each handler validates its input, calls
//! one service operation and maps the domain error to a status code. The
//! choreography itself runs in the consumer workers started by
//! [`AppState::spawn_workers`].

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, Backends, build_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/status", put(routes::orders::update_status))
        .route(
            "/orders/{id}/shipping-notification",
            post(routes::orders::notify_shipping),
        )
        .route("/payments", post(routes::payments::create))
        .route(
            "/payments/order/{order_id}",
            get(routes::payments::get_by_order),
        )
        .route("/payments/{id}/status", put(routes::payments::update_status))
        .route(
            "/inventory/{product_id}",
            get(routes::inventory::get).put(routes::inventory::set),
        )
        .route("/notifications", get(routes::notifications::list))
        .route(
            "/notifications/email",
            post(routes::notifications::send_email),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
