use axum::http::StatusCode;
use classifieds_api::{
    InMemoryRepository,
    auth::Principal,
    models::{Ad, Comment, CreateOrUpdateAd, NewUser, Role},
    policy::{self, Decision, ResourceRef},
    repository::Repository,
};

// --- Test Setup ---

async fn seed_user(repo: &InMemoryRepository, email: &str, role: Role) -> Principal {
    let user = repo
        .create_user(NewUser {
            email: email.to_string(),
            // The policy never looks at the hash.
            password_hash: "unused".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            phone: "+79161234567".to_string(),
            role,
        })
        .await
        .unwrap();
    Principal::from_user(&user)
}

fn ad_payload() -> CreateOrUpdateAd {
    CreateOrUpdateAd {
        title: "Road bike".to_string(),
        price: 300,
        description: "Barely used road bike".to_string(),
    }
}

struct World {
    repo: InMemoryRepository,
    alice: Principal,
    bob: Principal,
    admin: Principal,
}

async fn world() -> World {
    let repo = InMemoryRepository::new();
    let alice = seed_user(&repo, "alice@example.com", Role::User).await;
    let bob = seed_user(&repo, "bob@example.com", Role::User).await;
    let admin = seed_user(&repo, "admin@example.com", Role::Admin).await;
    World {
        repo,
        alice,
        bob,
        admin,
    }
}

fn principal(id: i64, role: Role) -> Principal {
    Principal {
        id,
        email: format!("user{id}@example.com"),
        role,
        display_name: String::new(),
    }
}

// --- Pure Rule ---

#[test]
fn test_decide_matches_rule_for_every_combination() {
    for principal_id in 1..=4 {
        for owner_id in 1..=4 {
            for role in [Role::User, Role::Admin] {
                let p = principal(principal_id, role);
                let ad = Ad {
                    author_id: owner_id,
                    ..Ad::default()
                };
                let comment = Comment {
                    author_id: owner_id,
                    ..Comment::default()
                };

                let expected = if role == Role::Admin || owner_id == principal_id {
                    Decision::Allow
                } else {
                    Decision::Deny
                };
                assert_eq!(policy::decide(&p, Some(&ad)), expected);
                assert_eq!(policy::decide(&p, Some(&comment)), expected);
            }
        }
    }
}

#[test]
fn test_decide_missing_resource_is_not_found_for_every_role() {
    for role in [Role::User, Role::Admin] {
        assert_eq!(
            policy::decide::<Ad>(&principal(1, role), None),
            Decision::NotFound
        );
        assert_eq!(
            policy::decide::<Comment>(&principal(1, role), None),
            Decision::NotFound
        );
    }
}

// --- Store-backed Authorization ---

#[tokio::test]
async fn test_owner_non_owner_and_admin_on_ad() {
    let w = world().await;
    let ad = w.repo.create_ad(w.alice.id, &ad_payload()).await.unwrap();
    let target = ResourceRef::Ad(ad.id);

    assert_eq!(policy::authorize(&w.repo, &w.alice, target).await.unwrap(), Decision::Allow);
    assert_eq!(policy::authorize(&w.repo, &w.bob, target).await.unwrap(), Decision::Deny);
    assert_eq!(policy::authorize(&w.repo, &w.admin, target).await.unwrap(), Decision::Allow);
}

#[tokio::test]
async fn test_missing_ad_is_not_found_before_ownership() {
    let w = world().await;
    let target = ResourceRef::Ad(4242);

    for p in [&w.alice, &w.bob, &w.admin] {
        assert_eq!(policy::authorize(&w.repo, p, target).await.unwrap(), Decision::NotFound);
    }
}

#[tokio::test]
async fn test_comment_ownership_and_addressing() {
    let w = world().await;
    let first_ad = w.repo.create_ad(w.alice.id, &ad_payload()).await.unwrap();
    let second_ad = w.repo.create_ad(w.alice.id, &ad_payload()).await.unwrap();
    let comment = w
        .repo
        .add_comment(first_ad.id, w.bob.id, "Is it still available?")
        .await
        .unwrap();

    let target = ResourceRef::Comment {
        ad_id: first_ad.id,
        comment_id: comment.id,
    };
    // Bob wrote the comment; Alice owns only the ad.
    assert_eq!(policy::authorize(&w.repo, &w.bob, target).await.unwrap(), Decision::Allow);
    assert_eq!(policy::authorize(&w.repo, &w.alice, target).await.unwrap(), Decision::Deny);
    assert_eq!(policy::authorize(&w.repo, &w.admin, target).await.unwrap(), Decision::Allow);

    // Same comment id under a different ad does not exist.
    let wrong_ad = ResourceRef::Comment {
        ad_id: second_ad.id,
        comment_id: comment.id,
    };
    assert_eq!(policy::authorize(&w.repo, &w.bob, wrong_ad).await.unwrap(), Decision::NotFound);

    // Nor does anything under a missing ad.
    let missing_ad = ResourceRef::Comment {
        ad_id: 999,
        comment_id: comment.id,
    };
    assert_eq!(
        policy::authorize(&w.repo, &w.admin, missing_ad).await.unwrap(),
        Decision::NotFound
    );
}

#[tokio::test]
async fn test_authorize_is_idempotent() {
    let w = world().await;
    let ad = w.repo.create_ad(w.alice.id, &ad_payload()).await.unwrap();

    for p in [&w.alice, &w.bob, &w.admin] {
        for target in [ResourceRef::Ad(ad.id), ResourceRef::Ad(ad.id + 100)] {
            let first = policy::authorize(&w.repo, p, target).await.unwrap();
            let second = policy::authorize(&w.repo, p, target).await.unwrap();
            assert_eq!(first, second);
        }
    }
    // The check itself changes nothing.
    assert!(w.repo.find_ad(ad.id).await.unwrap().is_some());
}

// --- Scenarios ---

#[tokio::test]
async fn test_non_owner_cannot_delete_but_admin_can() {
    let w = world().await;
    let ad = w.repo.create_ad(w.alice.id, &ad_payload()).await.unwrap();
    let target = ResourceRef::Ad(ad.id);

    // Bob (USER) tries to delete Alice's ad.
    assert_eq!(policy::authorize(&w.repo, &w.bob, target).await.unwrap(), Decision::Deny);
    let denied = policy::enforce(&w.repo, &w.bob, target).await.unwrap_err();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    // An ADMIN may.
    assert_eq!(policy::authorize(&w.repo, &w.admin, target).await.unwrap(), Decision::Allow);
    assert!(policy::enforce(&w.repo, &w.admin, target).await.is_ok());
}

#[tokio::test]
async fn test_enforce_maps_missing_to_404() {
    let w = world().await;
    let err = policy::enforce(&w.repo, &w.admin, ResourceRef::Ad(77))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_require_admin() {
    assert!(policy::require_admin(&principal(1, Role::Admin)).is_ok());
    assert_eq!(
        policy::require_admin(&principal(1, Role::User))
            .unwrap_err()
            .status(),
        StatusCode::FORBIDDEN
    );
}
