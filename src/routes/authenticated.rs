use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Every handler here receives a `Principal` resolved by the Authentication Gate.
/// Reads of single ads and comment threads are public and live in `routes::public`.
/// Update and delete handlers for ads and comments call `policy::enforce` before touching
/// the store: owner or ADMIN passes, anyone else gets 403, a missing target 404.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // POST /auth/set_password
        // Requires the current password; already-issued tokens stay valid.
        .route("/auth/set_password", post(handlers::set_password))
        // GET/PATCH /users/me
        .route("/users/me", get(handlers::get_me).patch(handlers::update_me))
        // PATCH /users/me/image
        // Returns a presigned upload URL for a new avatar.
        .route("/users/me/image", patch(handlers::update_my_image))
        // --- Ads ---
        // POST /ads
        // The caller becomes the owner.
        .route("/ads", post(handlers::create_ad))
        // GET /ads/me
        .route("/ads/me", get(handlers::get_my_ads))
        // PATCH/DELETE /ads/{id}
        .route(
            "/ads/{id}",
            patch(handlers::update_ad).delete(handlers::delete_ad),
        )
        // PATCH /ads/{id}/image
        .route("/ads/{id}/image", patch(handlers::update_ad_image))
        // --- Comments ---
        // POST /ads/{id}/comments
        .route("/ads/{id}/comments", post(handlers::add_comment))
        // PATCH/DELETE /ads/{id}/comments/{comment_id}
        .route(
            "/ads/{id}/comments/{comment_id}",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
}
