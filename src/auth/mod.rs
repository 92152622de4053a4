use crate::models::{Role, User};

pub mod gate;
pub mod password;
pub mod token;

pub use gate::{Credentials, authenticate};
pub use token::{Claims, TokenRejection, TokenService, TokenState};

/// Principal
///
/// The resolved identity of an authenticated request. Built by the Authentication Gate
/// (from token claims or verified Basic credentials) and handed to handlers as an
/// extractor argument. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Primary key of the `users` row; compared against a resource's owner id.
    pub id: i64,
    /// Login name, carried as the token subject.
    pub email: String,
    pub role: Role,
    pub display_name: String,
}

impl Principal {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            display_name: format!("{} {}", user.first_name, user.last_name)
                .trim()
                .to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
