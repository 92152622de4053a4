use crate::{AppState, handlers};
use axum::{Router, routing::patch};

/// Admin Router Module
///
/// Moderation endpoints, nested under `/admin`. The router is wrapped in the same
/// authentication layer as the authenticated module; each handler then requires the ADMIN
/// role and skips the ownership check. A missing target is still a 404.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PATCH/DELETE /admin/ads/{id}
        .route(
            "/ads/{id}",
            patch(handlers::admin_update_ad).delete(handlers::admin_delete_ad),
        )
        // PATCH/DELETE /admin/ads/{id}/comments/{comment_id}
        .route(
            "/ads/{id}/comments/{comment_id}",
            patch(handlers::admin_update_comment).delete(handlers::admin_delete_comment),
        )
}
