//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/scripts", post(handlers::upload_script));

    let install_routes = Router::new()
        .route("/install/{username}/{script}", get(handlers::install_script))
        .route(
            "/install/{username}/{namespace}/{script}",
            get(handlers::install_script),
        )
        .route("/meta/{username}/{script}", get(handlers::install_meta))
        .route(
            "/meta/{username}/{namespace}/{script}",
            get(handlers::install_meta),
        );

    let mut router = Router::new().merge(api_routes).merge(install_routes);

    if state.config.webhook.enabled {
        router = router.route("/hooks/github", post(handlers::github_hook));
    }

    // SECURITY: When enabled, this endpoint should be network-restricted
    // to the Prometheus scraper. See crate::metrics.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> Auth -> Handler
    router
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
