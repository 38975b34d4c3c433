//! HTTP API for the timed-slot order backend.
//!
//! Exposes the product catalog, sales slots with their inventory ledgers, and
//! the order lifecycle as JSON over HTTP, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{OrderService, ProductService, SalesSlotService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub products: ProductService<S>,
    pub slots: SalesSlotService<S>,
    pub orders: OrderService<S>,
}

impl<S: Store> AppState<S> {
    /// Wires every service to the same store.
    pub fn new(store: S) -> Self {
        Self {
            products: ProductService::new(store.clone()),
            slots: SalesSlotService::new(store.clone()),
            orders: OrderService::new(store),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
///
/// Resource routes live under `/api/v1`; `/health` and `/metrics` stay at the root.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", api_routes::<S>().with_state(state))
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

fn api_routes<S: Store>() -> Router<Arc<AppState<S>>> {
    use routes::{orders, products, sales_slots};

    Router::new()
        .route("/products", post(products::create::<S>).get(products::list::<S>))
        .route(
            "/products/{id}",
            get(products::get::<S>)
                .put(products::update::<S>)
                .delete(products::delete::<S>),
        )
        .route(
            "/sales-slots",
            post(sales_slots::create::<S>).get(sales_slots::list::<S>),
        )
        .route("/sales-slots/active", get(sales_slots::list_active::<S>))
        .route("/sales-slots/range", get(sales_slots::range::<S>))
        .route("/sales-slots/{id}", get(sales_slots::get::<S>))
        .route("/sales-slots/{id}/activate", put(sales_slots::activate::<S>))
        .route(
            "/sales-slots/{id}/deactivate",
            put(sales_slots::deactivate::<S>),
        )
        .route(
            "/sales-slots/{id}/products",
            post(sales_slots::add_product::<S>).get(sales_slots::list_products::<S>),
        )
        .route(
            "/sales-slots/{id}/products/{product_id}",
            put(sales_slots::update_inventory::<S>),
        )
        .route("/orders", post(orders::create::<S>).get(orders::list::<S>))
        .route("/orders/status", get(orders::list_by_status::<S>))
        .route("/orders/number/{ticket}", get(orders::get_by_ticket::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/items", post(orders::add_items::<S>))
        .route("/orders/{id}/status", put(orders::update_status::<S>))
        .route("/orders/{id}/confirm", put(orders::confirm::<S>))
        .route("/orders/{id}/cancel", put(orders::cancel::<S>))
        .route("/orders/{id}/payment", put(orders::update_payment::<S>))
        .route("/orders/{id}/delivery", put(orders::update_delivery::<S>))
}
