use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ApiError;

// --- Roles ---

/// Role
///
/// The two roles a principal can hold. Stored as `USER` / `ADMIN` in the `users.role`
/// column and carried in tokens as the authority string `ROLE_USER` / `ROLE_ADMIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Authority string embedded in the token `role` claim.
    pub fn authority(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }

    pub fn from_authority(authority: &str) -> Option<Self> {
        match authority {
            "ROLE_USER" => Some(Role::User),
            "ROLE_ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(value)),
        }
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// The credential record plus profile fields, one row of the `users` table.
/// Never serialized directly; responses go through `UserDto`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    // Login name, unique across the store.
    pub email: String,
    // Argon2 PHC string.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    // Object key of the avatar in storage.
    pub image: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// NewUser
///
/// Insert payload for the credential store. The hash is computed before it gets here.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
}

/// Ad
///
/// One row of the `ads` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Ad {
    pub id: i64,
    // FK to users.id (owner).
    pub author_id: i64,
    pub title: String,
    pub description: String,
    pub price: i32,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// One row of the `comments` table. Addressed by `(ad_id, id)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Comment {
    pub id: i64,
    pub ad_id: i64,
    // FK to users.id (owner).
    pub author_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /auth/register`. `username` is the email address.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterRequest {
    #[schema(example = "user@example.com")]
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "+79161234567")]
    pub phone: String,
    /// Defaults to `USER` when omitted.
    #[serde(default)]
    pub role: Option<Role>,
}

/// LoginRequest
///
/// Input payload for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "user@example.com")]
    pub username: String,
    pub password: String,
}

/// NewPasswordRequest
///
/// Input payload for `POST /auth/set_password`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// CreateOrUpdateAd
///
/// Input payload for creating an ad and for full updates (owner or admin).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateOrUpdateAd {
    #[schema(example = "Selling a laptop", min_length = 4, max_length = 32)]
    pub title: String,
    #[schema(example = 15000, minimum = 0)]
    pub price: i32,
    #[schema(example = "Laptop in great condition", min_length = 8, max_length = 64)]
    pub description: String,
}

/// CreateOrUpdateComment
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateOrUpdateComment {
    #[schema(min_length = 8, max_length = 128)]
    pub text: String,
}

/// UpdateUserRequest
///
/// Partial profile update for `PATCH /users/me`. Absent fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// ImageUploadRequest
///
/// Describes the image the client is about to upload directly to storage.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImageUploadRequest {
    #[schema(example = "bike.png")]
    pub filename: String,
    #[schema(example = "image/png")]
    pub file_type: String,
    /// Declared size in bytes.
    pub size: u64,
}

// --- Response Payloads (Output Schemas) ---

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
}

/// UserDto
///
/// Public view of a user's profile. Omits the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserDto {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub image: Option<String>,
    pub role: Role,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            image: user.image,
            role: user.role,
        }
    }
}

/// AdDto
///
/// Summary view of an ad, used in listings and as the create/update response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdDto {
    pub id: i64,
    pub author_id: i64,
    pub image: Option<String>,
    pub price: i32,
    pub title: String,
    pub description: String,
}

impl From<Ad> for AdDto {
    fn from(ad: Ad) -> Self {
        Self {
            id: ad.id,
            author_id: ad.author_id,
            image: ad.image,
            price: ad.price,
            title: ad.title,
            description: ad.description,
        }
    }
}

/// AdDetails
///
/// Extended view of a single ad joined with its author's contact data (`GET /ads/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdDetails {
    pub id: i64,
    pub author_first_name: String,
    pub author_last_name: String,
    pub description: String,
    pub email: String,
    pub image: Option<String>,
    pub phone: String,
    pub price: i32,
    pub title: String,
}

/// CommentDto
///
/// A comment joined with its author's first name and avatar.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentDto {
    pub id: i64,
    pub author_id: i64,
    pub author_image: Option<String>,
    pub author_first_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub text: String,
}

/// AdList
///
/// Count-plus-results wrapper used by the ad listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdList {
    pub count: usize,
    pub results: Vec<AdDto>,
}

impl From<Vec<Ad>> for AdList {
    fn from(ads: Vec<Ad>) -> Self {
        let results: Vec<AdDto> = ads.into_iter().map(AdDto::from).collect();
        Self { count: results.len(), results }
    }
}

/// CommentList
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentList {
    pub count: usize,
    pub results: Vec<CommentDto>,
}

impl From<Vec<CommentDto>> for CommentList {
    fn from(results: Vec<CommentDto>) -> Self {
        Self { count: results.len(), results }
    }
}

/// ImageUploadResponse
///
/// Presigned URL the client PUTs the file to, and the object key now recorded on the record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImageUploadResponse {
    pub upload_url: String,
    pub image: String,
}

// --- Request Validation ---

pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];
pub const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

/// Length bounds apply to the value exactly as it will be stored, padding included.
fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    if min > 0 && value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be blank")));
    }
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

/// `+7` followed by exactly ten digits.
fn is_valid_phone(phone: &str) -> bool {
    phone
        .strip_prefix("+7")
        .is_some_and(|rest| rest.len() == 10 && rest.chars().all(|c| c.is_ascii_digit()))
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_plausible_email(&self.username) {
            return Err(ApiError::Validation("username must be a valid email".to_string()));
        }
        check_len("password", &self.password, 8, 32)?;
        check_len("firstName", &self.first_name, 1, 64)?;
        check_len("lastName", &self.last_name, 1, 64)?;
        check_len("phone", &self.phone, 1, 32)
    }
}

impl NewPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.current_password.is_empty() {
            return Err(ApiError::Validation("currentPassword must not be empty".to_string()));
        }
        check_len("newPassword", &self.new_password, 8, 32)
    }
}

impl CreateOrUpdateAd {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("title", &self.title, 4, 32)?;
        check_len("description", &self.description, 8, 64)?;
        if self.price < 0 {
            return Err(ApiError::Validation("price must not be negative".to_string()));
        }
        Ok(())
    }
}

impl CreateOrUpdateComment {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("text", &self.text, 8, 128)
    }
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(first_name) = &self.first_name {
            check_len("firstName", first_name, 2, 16)?;
        }
        if let Some(last_name) = &self.last_name {
            check_len("lastName", last_name, 2, 16)?;
        }
        if let Some(phone) = &self.phone {
            if !is_valid_phone(phone) {
                return Err(ApiError::Validation(
                    "phone must look like +79161234567".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl ImageUploadRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !ALLOWED_IMAGE_TYPES.contains(&self.file_type.as_str()) {
            return Err(ApiError::Validation(format!(
                "fileType must be one of {}",
                ALLOWED_IMAGE_TYPES.join(", ")
            )));
        }
        if self.size == 0 || self.size > MAX_IMAGE_SIZE {
            return Err(ApiError::Validation("image must be between 1 byte and 5 MB".to_string()));
        }
        Ok(())
    }

    /// File extension taken from the client filename, `bin` when there is none.
    pub fn extension(&self) -> &str {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("bin")
    }
}
