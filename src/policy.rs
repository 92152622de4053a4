use crate::{
    auth::Principal,
    error::ApiError,
    models::{Ad, Comment},
    repository::{RepoResult, Repository},
};

/// ResourceRef
///
/// Addresses an ownable resource. Comments are always reached through their ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    Ad(i64),
    Comment { ad_id: i64, comment_id: i64 },
}

/// Outcome of an ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    NotFound,
}

/// A resource with exactly one owning principal.
pub trait Ownable {
    fn owner_id(&self) -> i64;
}

impl Ownable for Ad {
    fn owner_id(&self) -> i64 {
        self.author_id
    }
}

impl Ownable for Comment {
    fn owner_id(&self) -> i64 {
        self.author_id
    }
}

/// decide
///
/// The ownership rule over an already-resolved resource: a missing resource is `NotFound`
/// for every role; otherwise allow iff the principal is an admin or owns it.
pub fn decide<R: Ownable>(principal: &Principal, resource: Option<&R>) -> Decision {
    match resource {
        None => Decision::NotFound,
        Some(_) if principal.is_admin() => Decision::Allow,
        Some(r) if r.owner_id() == principal.id => Decision::Allow,
        Some(_) => Decision::Deny,
    }
}

/// authorize
///
/// Looks the resource up and applies `decide`. A comment whose ad is gone, or which lives
/// under a different ad, is `NotFound`.
pub async fn authorize(
    repo: &dyn Repository,
    principal: &Principal,
    target: ResourceRef,
) -> RepoResult<Decision> {
    let decision = match target {
        ResourceRef::Ad(id) => decide(principal, repo.find_ad(id).await?.as_ref()),
        ResourceRef::Comment { ad_id, comment_id } => match repo.find_ad(ad_id).await? {
            None => Decision::NotFound,
            Some(_) => decide(
                principal,
                repo.find_comment(ad_id, comment_id).await?.as_ref(),
            ),
        },
    };

    tracing::debug!(
        principal_id = principal.id,
        role = principal.role.as_str(),
        ?target,
        ?decision,
        "ownership check"
    );
    Ok(decision)
}

/// enforce
///
/// `authorize`, with `Deny` and `NotFound` turned into request errors. Called at the top of
/// every mutating ad/comment handler.
pub async fn enforce(
    repo: &dyn Repository,
    principal: &Principal,
    target: ResourceRef,
) -> Result<(), ApiError> {
    match authorize(repo, principal, target).await? {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(ApiError::AccessDenied),
        Decision::NotFound => Err(not_found(target)),
    }
}

/// Gate for the `/admin` routes: role only, no ownership.
pub fn require_admin(principal: &Principal) -> Result<(), ApiError> {
    if principal.is_admin() {
        Ok(())
    } else {
        tracing::debug!(principal_id = principal.id, "admin route refused");
        Err(ApiError::AccessDenied)
    }
}

pub(crate) fn not_found(target: ResourceRef) -> ApiError {
    match target {
        ResourceRef::Ad(id) => ApiError::ResourceNotFound(format!("ad {id}")),
        ResourceRef::Comment { ad_id, comment_id } => {
            ApiError::ResourceNotFound(format!("comment {comment_id} of ad {ad_id}"))
        }
    }
}
