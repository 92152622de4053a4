use axum::{
    Json,
    body::to_bytes,
    extract::{Path, State},
    http::StatusCode,
};
use classifieds_api::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, TokenService,
    auth::Principal,
    config::AuthMode,
    error::ApiError,
    handlers,
    models::{
        CreateOrUpdateAd, CreateOrUpdateComment, LoginRequest, LoginResponse, NewPasswordRequest,
        RegisterRequest, Role, UpdateUserRequest,
    },
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use std::sync::Arc;

// --- Test Setup ---

fn test_state_with(mode: AuthMode) -> AppState {
    let config = AppConfig {
        auth_mode: mode,
        ..AppConfig::default()
    };
    AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        tokens: Arc::new(TokenService::from_config(&config)),
        config,
    }
}

fn test_state() -> AppState {
    test_state_with(AuthMode::Bearer)
}

fn register_payload(email: &str, role: Option<Role>) -> RegisterRequest {
    RegisterRequest {
        username: email.to_string(),
        password: "Secret123".to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: "+79161234567".to_string(),
        role,
    }
}

async fn seed(state: &AppState, email: &str, role: Role) -> Principal {
    let response = handlers::register(State(state.clone()), Json(register_payload(email, Some(role))))
        .await
        .expect("registration should succeed");
    assert_eq!(response.status(), StatusCode::CREATED);

    let user = state
        .repo
        .find_user_by_email(email)
        .await
        .unwrap()
        .expect("registered user should exist");
    Principal::from_user(&user)
}

fn ad_payload(title: &str) -> CreateOrUpdateAd {
    CreateOrUpdateAd {
        title: title.to_string(),
        price: 1200,
        description: "Good condition, pick up only".to_string(),
    }
}

fn comment_payload(text: &str) -> CreateOrUpdateComment {
    CreateOrUpdateComment {
        text: text.to_string(),
    }
}

async fn create_ad(state: &AppState, owner: &Principal) -> i64 {
    let (status, Json(ad)) = handlers::create_ad(
        owner.clone(),
        State(state.clone()),
        Json(ad_payload("Desk lamp")),
    )
    .await
    .expect("create should succeed");
    assert_eq!(status, StatusCode::CREATED);
    ad.id
}

fn status_of(err: ApiError) -> StatusCode {
    err.status()
}

// --- Accounts ---

#[tokio::test]
async fn test_register_returns_token_in_bearer_mode() {
    let state = test_state();
    let response = handlers::register(
        State(state.clone()),
        Json(register_payload("alice@example.com", None)),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let login: LoginResponse = serde_json::from_slice(&body).unwrap();

    let principal = state.tokens.validate(&login.token).unwrap();
    assert_eq!(principal.email, "alice@example.com");
    assert_eq!(principal.role, Role::User);
}

#[tokio::test]
async fn test_register_returns_empty_body_in_basic_mode() {
    let state = test_state_with(AuthMode::Basic);
    let response = handlers::register(
        State(state),
        Json(register_payload("alice@example.com", None)),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_register_rejects_invalid_and_duplicate() {
    let state = test_state();
    let mut invalid = register_payload("not-an-email", None);
    invalid.password = "short".to_string();
    let err = handlers::register(State(state.clone()), Json(invalid))
        .await
        .err()
        .expect("invalid payload should be rejected");
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    seed(&state, "alice@example.com", Role::User).await;
    let err = handlers::register(
        State(state.clone()),
        Json(register_payload("alice@example.com", None)),
    )
    .await
    .err()
    .expect("second registration should be rejected");
    assert_eq!(status_of(err), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let state = test_state();
    seed(&state, "alice@example.com", Role::User).await;

    let ok = handlers::login(
        State(state.clone()),
        Json(LoginRequest {
            username: "alice@example.com".to_string(),
            password: "Secret123".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let err = handlers::login(
        State(state.clone()),
        Json(LoginRequest {
            username: "alice@example.com".to_string(),
            password: "Wrong1234".to_string(),
        }),
    )
    .await
    .err()
    .expect("wrong password should be rejected");
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_set_password_wrong_current_is_400() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;

    let err = handlers::set_password(
        alice.clone(),
        State(state.clone()),
        Json(NewPasswordRequest {
            current_password: "wrongOld".to_string(),
            new_password: "NewPass123".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::WrongCurrentPassword));
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    let ok = handlers::set_password(
        alice,
        State(state.clone()),
        Json(NewPasswordRequest {
            current_password: "Secret123".to_string(),
            new_password: "NewPass123".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(ok, StatusCode::OK);
}

#[tokio::test]
async fn test_get_and_update_profile() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;

    let Json(me) = handlers::get_me(alice.clone(), State(state.clone())).await.unwrap();
    assert_eq!(me.email, "alice@example.com");
    assert_eq!(me.role, Role::User);

    let Json(updated) = handlers::update_me(
        alice.clone(),
        State(state.clone()),
        Json(UpdateUserRequest {
            first_name: Some("Alicia".to_string()),
            last_name: None,
            phone: Some("+79990001122".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.first_name, "Alicia");
    assert_eq!(updated.last_name, "User");
    assert_eq!(updated.phone, "+79990001122");

    let err = handlers::update_me(
        alice,
        State(state),
        Json(UpdateUserRequest {
            phone: Some("12345".to_string()),
            ..UpdateUserRequest::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

// --- Ads ---

#[tokio::test]
async fn test_create_ad_is_owned_by_caller_and_listed() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;
    let bob = seed(&state, "bob@example.com", Role::User).await;

    let ad_id = create_ad(&state, &alice).await;

    let Json(all) = handlers::get_ads(State(state.clone())).await.unwrap();
    assert_eq!(all.count, 1);
    assert_eq!(all.results[0].author_id, alice.id);

    let Json(mine) = handlers::get_my_ads(alice.clone(), State(state.clone())).await.unwrap();
    assert_eq!(mine.count, 1);
    let Json(theirs) = handlers::get_my_ads(bob, State(state.clone())).await.unwrap();
    assert_eq!(theirs.count, 0);

    let Json(details) = handlers::get_ad(State(state.clone()), Path(ad_id)).await.unwrap();
    assert_eq!(details.email, "alice@example.com");
    assert_eq!(details.title, "Desk lamp");
}

#[tokio::test]
async fn test_create_ad_rejects_invalid_payload() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;

    let mut payload = ad_payload("abc");
    payload.price = -1;
    let err = handlers::create_ad(alice, State(state), Json(payload))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_ad_owner_admin_and_stranger() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;
    let bob = seed(&state, "bob@example.com", Role::User).await;
    let admin = seed(&state, "admin@example.com", Role::Admin).await;
    let ad_id = create_ad(&state, &alice).await;

    let err = handlers::update_ad(bob, State(state.clone()), Path(ad_id), Json(ad_payload("Hacked!")))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);

    let Json(by_owner) = handlers::update_ad(
        alice,
        State(state.clone()),
        Path(ad_id),
        Json(ad_payload("Desk lamp, brass")),
    )
    .await
    .unwrap();
    assert_eq!(by_owner.title, "Desk lamp, brass");

    let Json(by_admin) = handlers::update_ad(
        admin,
        State(state.clone()),
        Path(ad_id),
        Json(ad_payload("Moderated title")),
    )
    .await
    .unwrap();
    assert_eq!(by_admin.title, "Moderated title");
    // Ownership never transfers.
    assert_eq!(by_admin.author_id, by_owner.author_id);
}

#[tokio::test]
async fn test_delete_ad_checks_existence_then_ownership() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;
    let bob = seed(&state, "bob@example.com", Role::User).await;
    let ad_id = create_ad(&state, &alice).await;

    let err = handlers::delete_ad(bob.clone(), State(state.clone()), Path(ad_id + 1000))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);

    let err = handlers::delete_ad(bob, State(state.clone()), Path(ad_id))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);

    let status = handlers::delete_ad(alice, State(state.clone()), Path(ad_id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let err = handlers::get_ad(State(state), Path(ad_id)).await.unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}

// --- Comments ---

#[tokio::test]
async fn test_comment_lifecycle() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;
    let bob = seed(&state, "bob@example.com", Role::User).await;
    let ad_id = create_ad(&state, &alice).await;

    let (status, Json(comment)) = handlers::add_comment(
        bob.clone(),
        State(state.clone()),
        Path(ad_id),
        Json(comment_payload("Would you take 1000?")),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment.author_id, bob.id);
    assert_eq!(comment.author_first_name, "Test");

    // The ad owner does not own the comment.
    let err = handlers::update_comment(
        alice.clone(),
        State(state.clone()),
        Path((ad_id, comment.id)),
        Json(comment_payload("Rewritten by Alice")),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);

    let Json(edited) = handlers::update_comment(
        bob.clone(),
        State(state.clone()),
        Path((ad_id, comment.id)),
        Json(comment_payload("Would you take 1100?")),
    )
    .await
    .unwrap();
    assert_eq!(edited.text, "Would you take 1100?");

    let Json(list) = handlers::get_comments(State(state.clone()), Path(ad_id))
        .await
        .unwrap();
    assert_eq!(list.count, 1);

    let status = handlers::delete_comment(bob, State(state.clone()), Path((ad_id, comment.id)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(list) = handlers::get_comments(State(state), Path(ad_id)).await.unwrap();
    assert_eq!(list.count, 0);
}

#[tokio::test]
async fn test_comments_on_missing_ad_are_404() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;

    let err = handlers::get_comments(State(state.clone()), Path(404))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);

    let err = handlers::add_comment(
        alice,
        State(state),
        Path(404),
        Json(comment_payload("Anyone there at all?")),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}

// --- Admin ---

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;
    let ad_id = create_ad(&state, &alice).await;

    // Owning the ad is not enough on the admin routes.
    let err = handlers::admin_delete_ad(alice, State(state.clone()), Path(ad_id))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);
    assert!(state.repo.find_ad(ad_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_admin_moderates_any_ad_and_comment() {
    let state = test_state();
    let alice = seed(&state, "alice@example.com", Role::User).await;
    let bob = seed(&state, "bob@example.com", Role::User).await;
    let admin = seed(&state, "admin@example.com", Role::Admin).await;
    let ad_id = create_ad(&state, &alice).await;

    let (_, Json(comment)) = handlers::add_comment(
        bob,
        State(state.clone()),
        Path(ad_id),
        Json(comment_payload("Spam spam spam spam")),
    )
    .await
    .unwrap();

    let Json(edited) = handlers::admin_update_comment(
        admin.clone(),
        State(state.clone()),
        Path((ad_id, comment.id)),
        Json(comment_payload("[removed by moderator]")),
    )
    .await
    .unwrap();
    assert_eq!(edited.text, "[removed by moderator]");

    let Json(ad) = handlers::admin_update_ad(
        admin.clone(),
        State(state.clone()),
        Path(ad_id),
        Json(ad_payload("Moderated")),
    )
    .await
    .unwrap();
    assert_eq!(ad.title, "Moderated");

    let err = handlers::admin_delete_comment(
        admin.clone(),
        State(state.clone()),
        Path((ad_id, comment.id + 50)),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);

    let status = handlers::admin_delete_ad(admin.clone(), State(state.clone()), Path(ad_id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Comments went with the ad.
    assert!(state.repo.list_comments(ad_id).await.unwrap().is_empty());

    let err = handlers::admin_delete_ad(admin, State(state), Path(ad_id))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}
