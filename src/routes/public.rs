use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates an account; returns a token in Bearer mode.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Exchanges email and password for a session token.
        .route("/auth/login", post(handlers::login))
        // GET /ads
        // Lists every ad. Creating one (POST /ads) is in the authenticated module.
        .route("/ads", get(handlers::get_ads))
        // GET /ads/{id}
        // Ad card with the author's contact data. Edits live in the authenticated module.
        .route("/ads/{id}", get(handlers::get_ad))
        // GET /ads/{id}/comments
        .route("/ads/{id}/comments", get(handlers::get_comments))
}
