//! HTTP API for the order lifecycle service.
//!
//! Exposes the create/update/process/cancel workflows and the order
//! queries as REST endpoints, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use common::{CustomerId, ProductId};
use dispatch::Dispatcher;
use domain::{CustomerSnapshot, CustomerTier, Money, ProductSnapshot, ProductStatus};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    InMemoryCustomers, InMemoryInventory, InMemoryPaymentGateway, OrchestratorConfig,
    OrderOrchestrator, OrderQueries, TracingSideEffects,
};
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::search::<S>),
        )
        .route("/orders/high-value", get(routes::orders::high_value::<S>))
        .route("/orders/analytics", get(routes::orders::analytics::<S>))
        .route("/orders/statistics", get(routes::orders::statistics::<S>))
        .route("/orders/bulk", post(routes::orders::bulk::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/process", post(routes::orders::process::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/trigger-processing",
            post(routes::orders::trigger_processing::<S>),
        )
        .route("/customers/{id}/orders", get(routes::customers::orders::<S>))
        .route(
            "/customers/{id}/orders/summary",
            get(routes::customers::summary::<S>),
        )
        .route(
            "/collaborators/status",
            get(routes::collaborators::status::<S>),
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

/// The in-process collaborators the binary runs against.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub inventory: Arc<InMemoryInventory>,
    pub customers: Arc<InMemoryCustomers>,
    pub payments: Arc<InMemoryPaymentGateway>,
}

impl Collaborators {
    /// Collaborators seeded with a small catalog and customer base.
    pub fn demo() -> Self {
        let collaborators = Self::default();

        let catalog = [
            (1, "Mechanical Keyboard", "KB-001", 8999, 50),
            (2, "Wireless Mouse", "MS-002", 2499, 120),
            (3, "USB-C Hub", "HB-003", 3999, 35),
            (4, "27in Monitor", "MN-004", 29999, 10),
        ];
        for (id, name, sku, cents, stock) in catalog {
            collaborators.inventory.upsert(ProductSnapshot {
                id: ProductId::new(id),
                name: name.to_string(),
                sku: sku.to_string(),
                price: Money::from_cents(cents),
                stock_quantity: stock,
                status: ProductStatus::Active,
                available: true,
            });
        }

        let customers = [
            (1, "jdoe", "Jane Doe", CustomerTier::Bronze),
            (2, "rsmith", "Robin Smith", CustomerTier::Silver),
            (3, "kchan", "Kai Chan", CustomerTier::Gold),
            (4, "mlopez", "Maria Lopez", CustomerTier::Platinum),
        ];
        for (id, username, full_name, tier) in customers {
            collaborators.customers.upsert(CustomerSnapshot {
                id: CustomerId::new(id),
                username: username.to_string(),
                email: format!("{username}@example.com"),
                full_name: full_name.to_string(),
                tier,
                loyalty_points: 0,
            });
        }

        collaborators
    }
}

/// Wires the orchestrator and query facade over `store`.
pub fn create_state<S: OrderStore>(
    store: Arc<S>,
    collaborators: &Collaborators,
    config: OrchestratorConfig,
    dispatcher: Dispatcher,
) -> Arc<AppState<S>> {
    let orchestrator = OrderOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&collaborators.inventory),
        Arc::clone(&collaborators.customers),
        Arc::clone(&collaborators.payments),
        Arc::new(TracingSideEffects),
        dispatcher,
        config,
    );
    Arc::new(AppState {
        orchestrator,
        queries: OrderQueries::new(store),
    })
}
