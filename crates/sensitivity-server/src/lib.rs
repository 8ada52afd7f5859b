pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health))
        // Saga triggers
        .route("/api/requests", post(routes::requests::submit_request))
        .route(
            "/api/tiers/{tier}/requests",
            post(routes::requests::submit_tier_request),
        )
        // Policy inspection
        .route("/api/tiers", get(routes::tiers::list_tiers))
        .route("/api/tiers/{tier}", get(routes::tiers::get_tier))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the classification trigger server.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Start the server on a pre-bound listener.
///
/// Lets the caller read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    let tiers: Vec<&str> = app_state
        .policies()
        .iter()
        .map(|p| p.tier.as_str())
        .collect();
    tracing::info!(?tiers, "classification server listening on http://localhost:{port}");

    axum::serve(listener, build_router(app_state)).await?;
    Ok(())
}
