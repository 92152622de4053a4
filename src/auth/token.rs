use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{auth::Principal, config::AppConfig, error::ApiError, models::Role};

/// Claims
///
/// Payload of a session token. Self-contained: the gate rebuilds the principal from these
/// fields alone, without a store lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the principal's email.
    pub sub: String,
    /// Authority string, `ROLE_USER` or `ROLE_ADMIN`.
    pub role: String,
    /// Numeric user id.
    pub uid: i64,
    /// Display name.
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

impl From<TokenRejection> for ApiError {
    fn from(rejection: TokenRejection) -> Self {
        ApiError::TokenInvalid(rejection.to_string())
    }
}

/// TokenService
///
/// Issues and validates HS256-signed session tokens with a fixed lifetime.
/// Holds no session state; validation is a pure function of the token, the secret and the clock.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_hours: i64,
}

pub type TokenState = Arc<TokenService>;

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: no grace period after `exp`.
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_hours,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expiration_hours)
    }

    /// Issues a token for `principal`, valid from now for the configured TTL.
    pub fn issue(&self, principal: &Principal) -> Result<String, ApiError> {
        self.issue_at(principal, Utc::now())
    }

    /// Issues a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        let expires_at = Duration::try_hours(self.ttl_hours)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                ApiError::Internal(format!("token ttl of {}h is out of range", self.ttl_hours))
            })?;

        let claims = Claims {
            sub: principal.email.clone(),
            role: principal.role.authority().to_string(),
            uid: principal.id,
            name: principal.display_name.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verifies signature and expiry and rebuilds the principal from the claims.
    pub fn validate(&self, token: &str) -> Result<Principal, TokenRejection> {
        let claims = self.decode_claims(token)?;
        let role = Role::from_authority(&claims.role).ok_or(TokenRejection::Malformed)?;

        Ok(Principal {
            id: claims.uid,
            email: claims.sub,
            role,
            display_name: claims.name,
        })
    }

    /// Returns the token subject (the principal's email).
    ///
    /// Callers normally hold a token that already passed `validate`; this still verifies it
    /// again and reports the rejection for anything else.
    pub fn subject(&self, token: &str) -> Result<String, TokenRejection> {
        self.decode_claims(token).map(|claims| claims.sub)
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenRejection> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            })?;

        // jsonwebtoken still accepts `exp == now`; a token is only valid strictly before `exp`.
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenRejection::Expired);
        }
        Ok(claims)
    }
}
