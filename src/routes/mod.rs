//! Router Module Index
//!
//! Splits the API by access level. Authentication is applied per module as an Axum
//! `route_layer` in `create_router`.

/// Routes open to anonymous callers: health, registration, login and read access to ads and comments.
pub mod public;

/// Routes behind the Authentication Gate. Mutations of ads and comments additionally run
/// the ownership policy inside the handler.
pub mod authenticated;

/// Moderation routes for the ADMIN role.
pub mod admin;
