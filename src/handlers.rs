use crate::{
    AppState, accounts,
    auth::Principal,
    config::AuthMode,
    error::ApiError,
    models::{
        AdDetails, AdDto, AdList, CommentDto, CommentList, CreateOrUpdateAd,
        CreateOrUpdateComment, ImageUploadRequest, ImageUploadResponse, LoginRequest,
        LoginResponse, NewPasswordRequest, RegisterRequest, UpdateUserRequest, UserDto,
    },
    policy::{self, ResourceRef},
    storage::StorageState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

// --- Helpers ---

/// Issues a token for a freshly verified user, or an empty body when the gate runs in Basic mode.
fn session_response(
    state: &AppState,
    status: StatusCode,
    principal: &Principal,
) -> Result<Response, ApiError> {
    match state.config.auth_mode {
        AuthMode::Bearer => {
            let token = state.tokens.issue(principal)?;
            Ok((status, Json(LoginResponse { token })).into_response())
        }
        AuthMode::Basic => Ok(status.into_response()),
    }
}

/// Presigns an upload under `prefix/` and returns the URL with the new object key.
async fn presign_image(
    storage: &StorageState,
    prefix: &str,
    payload: &ImageUploadRequest,
) -> Result<ImageUploadResponse, ApiError> {
    payload.validate()?;

    let object_key = format!("{}/{}.{}", prefix, Uuid::new_v4(), payload.extension());
    let upload_url = storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(ApiError::Storage)?;

    Ok(ImageUploadResponse {
        upload_url,
        image: object_key,
    })
}

/// Best-effort removal of a replaced or orphaned image. Failures are only logged.
async fn discard_image(storage: &StorageState, key: Option<String>) {
    if let Some(key) = key {
        if let Err(e) = storage.delete_object(&key).await {
            tracing::warn!("failed to delete image {}: {}", key, e);
        }
    }
}

async fn apply_ad_update(
    state: &AppState,
    id: i64,
    payload: &CreateOrUpdateAd,
) -> Result<AdDto, ApiError> {
    state
        .repo
        .update_ad(id, payload)
        .await?
        .map(AdDto::from)
        .ok_or_else(|| policy::not_found(ResourceRef::Ad(id)))
}

async fn remove_ad(state: &AppState, id: i64) -> Result<(), ApiError> {
    let ad = state
        .repo
        .find_ad(id)
        .await?
        .ok_or_else(|| policy::not_found(ResourceRef::Ad(id)))?;

    if !state.repo.delete_ad(id).await? {
        return Err(policy::not_found(ResourceRef::Ad(id)));
    }
    discard_image(&state.storage, ad.image).await;

    tracing::info!(ad_id = id, "ad deleted");
    Ok(())
}

async fn apply_comment_update(
    state: &AppState,
    ad_id: i64,
    comment_id: i64,
    text: &str,
) -> Result<CommentDto, ApiError> {
    state
        .repo
        .update_comment(ad_id, comment_id, text)
        .await?
        .ok_or_else(|| policy::not_found(ResourceRef::Comment { ad_id, comment_id }))
}

async fn remove_comment(state: &AppState, ad_id: i64, comment_id: i64) -> Result<(), ApiError> {
    if !state.repo.delete_comment(ad_id, comment_id).await? {
        return Err(policy::not_found(ResourceRef::Comment { ad_id, comment_id }));
    }
    tracing::info!(ad_id, comment_id, "comment deleted");
    Ok(())
}

/// Admin routes skip ownership but still report a missing ad as 404.
async fn require_ad(state: &AppState, id: i64) -> Result<(), ApiError> {
    match state.repo.find_ad(id).await? {
        Some(_) => Ok(()),
        None => Err(policy::not_found(ResourceRef::Ad(id))),
    }
}

// --- Account Handlers ---

/// register
///
/// [Public Route] Creates an account. In Bearer mode the response carries a session token;
/// in Basic mode the body is empty and the client authenticates with its credentials.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = LoginResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let user = accounts::register(state.repo.as_ref(), payload).await?;
    session_response(&state, StatusCode::CREATED, &Principal::from_user(&user))
}

/// login
///
/// [Public Route] Verifies email and password and issues a session token (Bearer mode).
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user =
        accounts::verify_credentials(state.repo.as_ref(), &payload.username, &payload.password)
            .await?;
    tracing::debug!(user_id = user.id, "login succeeded");
    session_response(&state, StatusCode::OK, &Principal::from_user(&user))
}

/// set_password
///
/// [Authenticated Route] Replaces the caller's password after checking the current one.
#[utoipa::path(
    post,
    path = "/auth/set_password",
    request_body = NewPasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Wrong current password or invalid new password")
    )
)]
pub async fn set_password(
    principal: Principal,
    State(state): State<AppState>,
    Json(payload): Json<NewPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    payload.validate()?;
    accounts::change_password(
        state.repo.as_ref(),
        &principal,
        &payload.current_password,
        &payload.new_password,
    )
    .await
    .map_err(|e| match e {
        ApiError::InvalidCredentials => ApiError::WrongCurrentPassword,
        other => other,
    })?;
    Ok(StatusCode::OK)
}

/// get_me
///
/// [Authenticated Route] Returns the caller's profile. Served at `/users/me` and `/auth/me`.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Profile", body = UserDto),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_me(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .repo
        .find_user(principal.id)
        .await?
        .ok_or_else(|| ApiError::ResourceNotFound(format!("user {}", principal.id)))?;
    Ok(Json(UserDto::from(user)))
}

/// update_me
///
/// [Authenticated Route] Partial profile update; absent fields keep their value.
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserDto),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn update_me(
    principal: Principal,
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserDto>, ApiError> {
    payload.validate()?;
    let user = state
        .repo
        .update_profile(principal.id, &payload)
        .await?
        .ok_or_else(|| ApiError::ResourceNotFound(format!("user {}", principal.id)))?;
    Ok(Json(UserDto::from(user)))
}

/// update_my_image
///
/// [Authenticated Route] Starts an avatar upload. The new object key is recorded right away
/// and the previous avatar is removed.
#[utoipa::path(
    patch,
    path = "/users/me/image",
    request_body = ImageUploadRequest,
    responses(
        (status = 200, description = "Upload URL", body = ImageUploadResponse),
        (status = 400, description = "Unsupported type or size")
    )
)]
pub async fn update_my_image(
    principal: Principal,
    State(state): State<AppState>,
    Json(payload): Json<ImageUploadRequest>,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    let previous = state
        .repo
        .find_user(principal.id)
        .await?
        .ok_or_else(|| ApiError::ResourceNotFound(format!("user {}", principal.id)))?
        .image;

    let upload = presign_image(&state.storage, "avatars", &payload).await?;
    state.repo.set_user_image(principal.id, &upload.image).await?;
    discard_image(&state.storage, previous).await;

    Ok(Json(upload))
}

// --- Ad Handlers ---

/// get_ads
///
/// [Public Route] Lists every ad, newest first.
#[utoipa::path(
    get,
    path = "/ads",
    responses((status = 200, description = "All ads", body = AdList))
)]
pub async fn get_ads(State(state): State<AppState>) -> Result<Json<AdList>, ApiError> {
    Ok(Json(AdList::from(state.repo.list_ads().await?)))
}

/// get_my_ads
///
/// [Authenticated Route] Lists the caller's own ads.
#[utoipa::path(
    get,
    path = "/ads/me",
    responses((status = 200, description = "My ads", body = AdList))
)]
pub async fn get_my_ads(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<AdList>, ApiError> {
    Ok(Json(AdList::from(
        state.repo.list_ads_by_author(principal.id).await?,
    )))
}

/// get_ad
///
/// [Public Route] Extended view of one ad with the author's contact data.
#[utoipa::path(
    get,
    path = "/ads/{id}",
    params(("id" = i64, Path, description = "Ad ID")),
    responses(
        (status = 200, description = "Found", body = AdDetails),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_ad(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AdDetails>, ApiError> {
    state
        .repo
        .find_ad_details(id)
        .await?
        .map(Json)
        .ok_or_else(|| policy::not_found(ResourceRef::Ad(id)))
}

/// create_ad
///
/// [Authenticated Route] Creates an ad owned by the caller.
#[utoipa::path(
    post,
    path = "/ads",
    request_body = CreateOrUpdateAd,
    responses(
        (status = 201, description = "Created", body = AdDto),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_ad(
    principal: Principal,
    State(state): State<AppState>,
    Json(payload): Json<CreateOrUpdateAd>,
) -> Result<(StatusCode, Json<AdDto>), ApiError> {
    payload.validate()?;
    let ad = state.repo.create_ad(principal.id, &payload).await?;
    tracing::info!(ad_id = ad.id, author_id = principal.id, "ad created");
    Ok((StatusCode::CREATED, Json(AdDto::from(ad))))
}

/// update_ad
///
/// [Authenticated Route] Replaces title, price and description. Owner or admin only.
#[utoipa::path(
    patch,
    path = "/ads/{id}",
    params(("id" = i64, Path, description = "Ad ID")),
    request_body = CreateOrUpdateAd,
    responses(
        (status = 200, description = "Updated", body = AdDto),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_ad(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateOrUpdateAd>,
) -> Result<Json<AdDto>, ApiError> {
    payload.validate()?;
    policy::enforce(state.repo.as_ref(), &principal, ResourceRef::Ad(id)).await?;
    Ok(Json(apply_ad_update(&state, id, &payload).await?))
}

/// delete_ad
///
/// [Authenticated Route] Deletes an ad with its comments and image. Owner or admin only.
#[utoipa::path(
    delete,
    path = "/ads/{id}",
    params(("id" = i64, Path, description = "Ad ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_ad(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    policy::enforce(state.repo.as_ref(), &principal, ResourceRef::Ad(id)).await?;
    remove_ad(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// update_ad_image
///
/// [Authenticated Route] Starts an upload for the ad's picture. Owner or admin only.
#[utoipa::path(
    patch,
    path = "/ads/{id}/image",
    params(("id" = i64, Path, description = "Ad ID")),
    request_body = ImageUploadRequest,
    responses(
        (status = 200, description = "Upload URL", body = ImageUploadResponse),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_ad_image(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ImageUploadRequest>,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    policy::enforce(state.repo.as_ref(), &principal, ResourceRef::Ad(id)).await?;

    let previous = state
        .repo
        .find_ad(id)
        .await?
        .ok_or_else(|| policy::not_found(ResourceRef::Ad(id)))?
        .image;

    let upload = presign_image(&state.storage, "ads", &payload).await?;
    if state.repo.set_ad_image(id, &upload.image).await?.is_none() {
        return Err(policy::not_found(ResourceRef::Ad(id)));
    }
    discard_image(&state.storage, previous).await;

    Ok(Json(upload))
}

// --- Comment Handlers ---

/// get_comments
///
/// [Public Route] Lists an ad's comments, oldest first. 404 if the ad does not exist.
#[utoipa::path(
    get,
    path = "/ads/{id}/comments",
    params(("id" = i64, Path, description = "Ad ID")),
    responses(
        (status = 200, description = "Comments", body = CommentList),
        (status = 404, description = "Ad Not Found")
    )
)]
pub async fn get_comments(
    State(state): State<AppState>,
    Path(ad_id): Path<i64>,
) -> Result<Json<CommentList>, ApiError> {
    require_ad(&state, ad_id).await?;
    Ok(Json(CommentList::from(
        state.repo.list_comments(ad_id).await?,
    )))
}

/// add_comment
///
/// [Authenticated Route] Posts a comment on an ad as the caller.
#[utoipa::path(
    post,
    path = "/ads/{id}/comments",
    params(("id" = i64, Path, description = "Ad ID")),
    request_body = CreateOrUpdateComment,
    responses(
        (status = 201, description = "Comment Added", body = CommentDto),
        (status = 404, description = "Ad Not Found")
    )
)]
pub async fn add_comment(
    principal: Principal,
    State(state): State<AppState>,
    Path(ad_id): Path<i64>,
    Json(payload): Json<CreateOrUpdateComment>,
) -> Result<(StatusCode, Json<CommentDto>), ApiError> {
    payload.validate()?;
    require_ad(&state, ad_id).await?;

    let comment = state
        .repo
        .add_comment(ad_id, principal.id, &payload.text)
        .await?;
    tracing::info!(ad_id, comment_id = comment.id, "comment added");
    Ok((StatusCode::CREATED, Json(comment)))
}

/// update_comment
///
/// [Authenticated Route] Edits a comment. Owner or admin only.
#[utoipa::path(
    patch,
    path = "/ads/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Ad ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CreateOrUpdateComment,
    responses(
        (status = 200, description = "Updated", body = CommentDto),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    principal: Principal,
    State(state): State<AppState>,
    Path((ad_id, comment_id)): Path<(i64, i64)>,
    Json(payload): Json<CreateOrUpdateComment>,
) -> Result<Json<CommentDto>, ApiError> {
    payload.validate()?;
    policy::enforce(
        state.repo.as_ref(),
        &principal,
        ResourceRef::Comment { ad_id, comment_id },
    )
    .await?;
    Ok(Json(
        apply_comment_update(&state, ad_id, comment_id, &payload.text).await?,
    ))
}

/// delete_comment
///
/// [Authenticated Route] Deletes a comment. Owner or admin only.
#[utoipa::path(
    delete,
    path = "/ads/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Ad ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    principal: Principal,
    State(state): State<AppState>,
    Path((ad_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    policy::enforce(
        state.repo.as_ref(),
        &principal,
        ResourceRef::Comment { ad_id, comment_id },
    )
    .await?;
    remove_comment(&state, ad_id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin Handlers ---

/// admin_update_ad
///
/// [Admin Route] Updates any ad. Requires the ADMIN role; ownership is not checked.
#[utoipa::path(
    patch,
    path = "/admin/ads/{id}",
    params(("id" = i64, Path, description = "Ad ID")),
    request_body = CreateOrUpdateAd,
    responses(
        (status = 200, description = "Updated", body = AdDto),
        (status = 403, description = "Not Admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn admin_update_ad(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateOrUpdateAd>,
) -> Result<Json<AdDto>, ApiError> {
    policy::require_admin(&principal)?;
    payload.validate()?;
    Ok(Json(apply_ad_update(&state, id, &payload).await?))
}

/// admin_delete_ad
///
/// [Admin Route] Deletes any ad.
#[utoipa::path(
    delete,
    path = "/admin/ads/{id}",
    params(("id" = i64, Path, description = "Ad ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn admin_delete_ad(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    policy::require_admin(&principal)?;
    remove_ad(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// admin_update_comment
///
/// [Admin Route] Edits any comment.
#[utoipa::path(
    patch,
    path = "/admin/ads/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Ad ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CreateOrUpdateComment,
    responses(
        (status = 200, description = "Updated", body = CommentDto),
        (status = 403, description = "Not Admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn admin_update_comment(
    principal: Principal,
    State(state): State<AppState>,
    Path((ad_id, comment_id)): Path<(i64, i64)>,
    Json(payload): Json<CreateOrUpdateComment>,
) -> Result<Json<CommentDto>, ApiError> {
    policy::require_admin(&principal)?;
    payload.validate()?;
    require_ad(&state, ad_id).await?;
    Ok(Json(
        apply_comment_update(&state, ad_id, comment_id, &payload.text).await?,
    ))
}

/// admin_delete_comment
///
/// [Admin Route] Deletes any comment.
#[utoipa::path(
    delete,
    path = "/admin/ads/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Ad ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn admin_delete_comment(
    principal: Principal,
    State(state): State<AppState>,
    Path((ad_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    policy::require_admin(&principal)?;
    require_ad(&state, ad_id).await?;
    remove_comment(&state, ad_id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
