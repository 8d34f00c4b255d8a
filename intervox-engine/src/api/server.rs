//! HTTP server setup and routing

use axum::routing::{get, post};
use axum::Router;
use intervox_common::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::engine::SessionEngine;
use crate::notify::Notifier;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<SessionEngine>,
    pub notifier: Arc<Notifier>,
}

/// Build the interview API router.
pub fn api_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/interview/start", post(super::handlers::start_interview))
        .route(
            "/interview/history",
            get(super::handlers::get_interview_history),
        )
        .route("/interview/:id", get(super::handlers::get_interview))
        .route(
            "/interview/:id/submit",
            post(super::handlers::submit_interview),
        )
        .route(
            "/interview/:id/favorite",
            post(super::handlers::favorite_interview),
        )
        .route(
            "/interview/:id/question/:index",
            get(super::handlers::get_next_question),
        )
        .route(
            "/interview/:id/question/:index/answer",
            post(super::handlers::submit_answer),
        )
        .route(
            "/public-questions",
            get(super::handlers::get_public_questions),
        )
        .route("/demo", get(super::handlers::demo_interview_default))
        .route("/demo/:topic", get(super::handlers::demo_interview))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
}

/// Build the SSE notification router, served on its own port.
pub fn sse_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
}

/// Bind and serve a router until the process exits.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("failed to bind to {}: {}", addr, e)))?;
    axum::serve(listener, router)
        .await
        .map_err(|e| Error::Http(format!("server error: {}", e)))?;
    Ok(())
}
