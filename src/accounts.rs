use crate::{
    auth::{Principal, password},
    error::ApiError,
    models::{NewUser, RegisterRequest, Role, User},
    repository::{Repository, RepositoryError},
};

/// register
///
/// Creates a credential record. The email must be unused; the role is `USER` unless the
/// request names one. The store's unique constraint settles concurrent registrations.
pub async fn register(repo: &dyn Repository, req: RegisterRequest) -> Result<User, ApiError> {
    if repo.exists_by_email(&req.username).await? {
        return Err(ApiError::DuplicateAccount(req.username));
    }

    let password_hash = password::hash_password(&req.password)?;
    let new_user = NewUser {
        email: req.username,
        password_hash,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
        role: req.role.unwrap_or(Role::User),
    };

    let user = repo.create_user(new_user).await.map_err(|e| match e {
        RepositoryError::Conflict(email) => ApiError::DuplicateAccount(email),
        other => ApiError::Repository(other),
    })?;

    tracing::info!(user_id = user.id, role = user.role.as_str(), "user registered");
    Ok(user)
}

/// verify_credentials
///
/// Looks the email up and checks the password. Unknown email and wrong password are
/// indistinguishable to the caller.
pub async fn verify_credentials(
    repo: &dyn Repository,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    match repo.find_user_by_email(email).await? {
        Some(user) if password::verify_password(password, &user.password_hash) => Ok(user),
        _ => Err(ApiError::InvalidCredentials),
    }
}

/// change_password
///
/// Replaces the stored digest after checking `current`. On mismatch the store is left
/// untouched and `InvalidCredentials` is returned. Tokens issued earlier stay valid.
pub async fn change_password(
    repo: &dyn Repository,
    principal: &Principal,
    current: &str,
    new: &str,
) -> Result<(), ApiError> {
    let user = repo
        .find_user(principal.id)
        .await?
        .ok_or_else(|| ApiError::ResourceNotFound(format!("user {}", principal.id)))?;

    if !password::verify_password(current, &user.password_hash) {
        tracing::warn!(user_id = user.id, "password change refused: wrong current password");
        return Err(ApiError::InvalidCredentials);
    }

    let password_hash = password::hash_password(new)?;
    if !repo.update_password(user.id, &password_hash).await? {
        return Err(ApiError::ResourceNotFound(format!("user {}", user.id)));
    }

    tracing::info!(user_id = user.id, "password changed");
    Ok(())
}
