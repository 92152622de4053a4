use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{
    accounts,
    auth::{Principal, TokenService, TokenState},
    config::{AppConfig, AuthMode},
    error::ApiError,
    repository::{Repository, RepositoryState},
};

/// Credentials
///
/// The credential a caller presented in the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { email: String, password: String },
}

impl Credentials {
    /// Reads `Authorization: Bearer <token>` or `Authorization: Basic <base64(email:password)>`.
    ///
    /// Returns `None` when the header is absent or cannot be parsed.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        // Auth schemes are case-insensitive.
        let (scheme, rest) = value.trim().split_once(' ')?;
        let rest = rest.trim();
        if rest.is_empty() {
            return None;
        }

        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(Credentials::Bearer(rest.to_string()));
        }
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(rest).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        // Passwords may contain ':'; the email may not.
        let (email, password) = decoded.split_once(':')?;

        Some(Credentials::Basic {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

/// authenticate
///
/// Resolves the acting principal or rejects the request. Only the credential kind matching
/// `mode` is accepted; a Bearer token sent to a Basic gate (or the reverse) is a 401.
pub async fn authenticate(
    credentials: Option<Credentials>,
    mode: AuthMode,
    tokens: &TokenService,
    repo: &dyn Repository,
) -> Result<Principal, ApiError> {
    match (mode, credentials) {
        (AuthMode::Bearer, Some(Credentials::Bearer(token))) => {
            tokens.validate(&token).map_err(ApiError::from)
        }
        (AuthMode::Basic, Some(Credentials::Basic { email, password })) => {
            let user = accounts::verify_credentials(repo, &email, &password).await?;
            Ok(Principal::from_user(&user))
        }
        (_, None) => Err(ApiError::TokenInvalid("missing credentials".to_string())),
        (mode, Some(_)) => Err(ApiError::TokenInvalid(format!(
            "credential kind not accepted in {mode:?} mode"
        ))),
    }
}

/// Principal Extractor Implementation
///
/// Makes `Principal` usable as a handler argument. Authentication runs before the handler
/// body; any failure rejects with the `ApiError` 401 response.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by `auth_middleware` for this request.
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let credentials = Credentials::from_headers(&parts.headers);
        authenticate(credentials, config.auth_mode, &tokens, repo.as_ref()).await
    }
}
