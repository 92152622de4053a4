use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;
pub mod storage;

pub mod routes;
use auth::Principal;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{TokenService, TokenState};
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers and `ToSchema` models.
/// Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::set_password, handlers::get_me,
        handlers::update_me, handlers::update_my_image, handlers::get_ads, handlers::get_my_ads,
        handlers::get_ad, handlers::create_ad, handlers::update_ad, handlers::delete_ad,
        handlers::update_ad_image, handlers::get_comments, handlers::add_comment,
        handlers::update_comment, handlers::delete_comment, handlers::admin_update_ad,
        handlers::admin_delete_ad, handlers::admin_update_comment, handlers::admin_delete_comment
    ),
    components(
        schemas(
            models::Role, models::RegisterRequest, models::LoginRequest, models::LoginResponse,
            models::NewPasswordRequest, models::UpdateUserRequest, models::UserDto,
            models::CreateOrUpdateAd, models::AdDto, models::AdDetails, models::AdList,
            models::CreateOrUpdateComment, models::CommentDto, models::CommentList,
            models::ImageUploadRequest, models::ImageUploadResponse,
        )
    ),
    tags(
        (name = "classifieds", description = "Classifieds Marketplace API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for every service a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Credential store plus ads and comments.
    pub repo: RepositoryState,
    /// Object storage for images.
    pub storage: StorageState,
    /// Session token issuer and validator.
    pub tokens: TokenState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let handlers and the `Principal` extractor pull single components out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the Authentication Gate before any protected handler. A failed extraction of
/// `Principal` rejects with 401; on success the principal is stored in the request
/// extensions so the handler's own `Principal` argument does not authenticate twice.
async fn auth_middleware(principal: Principal, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, applies the gate to the protected modules and wraps
/// everything in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Role check happens inside the admin handlers, after this layer authenticated the caller.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` set by
/// `SetRequestIdLayer`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
