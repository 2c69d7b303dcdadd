mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::birth::BirthResolver;
pub use state::AppState;

pub fn build_router(births: BirthResolver) -> Router {
    let state = Arc::new(AppState { births });

    Router::new()
        .route("/api/geo/resolve", get(handlers::geo_resolve))
        .route("/api/birth/resolve", post(handlers::resolve_birth))
        .route("/api/facts", post(handlers::facts))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(births: BirthResolver, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(births);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "hora server listening");
    axum::serve(listener, app).await
}
