use crate::models::{
    Ad, AdDetails, Comment, CommentDto, CreateOrUpdateAd, NewUser, UpdateUserRequest, User,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// RepositoryError
///
/// Store-level failures. `Conflict` is raised by the unique-email constraint.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Abstract contract for every persistence operation: the credential store plus the
/// ad and comment collaborators. Handlers, the gate and the policy only see this trait,
/// so the Postgres and in-memory implementations are interchangeable.
///
/// `Send + Sync + async_trait` make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn exists_by_email(&self, email: &str) -> RepoResult<bool>;
    // Fails with `Conflict` when the email is already taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool>;
    async fn update_profile(&self, id: i64, req: &UpdateUserRequest) -> RepoResult<Option<User>>;
    async fn set_user_image(&self, id: i64, image: &str) -> RepoResult<Option<User>>;

    // --- Ads ---
    async fn list_ads(&self) -> RepoResult<Vec<Ad>>;
    async fn list_ads_by_author(&self, author_id: i64) -> RepoResult<Vec<Ad>>;
    async fn find_ad(&self, id: i64) -> RepoResult<Option<Ad>>;
    async fn find_ad_details(&self, id: i64) -> RepoResult<Option<AdDetails>>;
    async fn create_ad(&self, author_id: i64, req: &CreateOrUpdateAd) -> RepoResult<Ad>;
    async fn update_ad(&self, id: i64, req: &CreateOrUpdateAd) -> RepoResult<Option<Ad>>;
    async fn set_ad_image(&self, id: i64, image: &str) -> RepoResult<Option<Ad>>;
    async fn delete_ad(&self, id: i64) -> RepoResult<bool>;

    // --- Comments (always addressed through their ad) ---
    async fn list_comments(&self, ad_id: i64) -> RepoResult<Vec<CommentDto>>;
    async fn find_comment(&self, ad_id: i64, comment_id: i64) -> RepoResult<Option<Comment>>;
    async fn add_comment(&self, ad_id: i64, author_id: i64, text: &str) -> RepoResult<CommentDto>;
    async fn update_comment(
        &self,
        ad_id: i64,
        comment_id: i64,
        text: &str,
    ) -> RepoResult<Option<CommentDto>>;
    async fn delete_comment(&self, ad_id: i64, comment_id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, phone, image, role";
const AD_COLUMNS: &str = "id, author_id, title, description, price, image, created_at";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Queries are built at runtime so the crate compiles
/// without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(err: sqlx::Error, what: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(what.to_string())
        }
        _ => RepositoryError::Database(err),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn exists_by_email(&self, email: &str) -> RepoResult<bool> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    /// create_user
    ///
    /// The unique index on `users.email` is the final arbiter for concurrent registrations.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, phone, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &user.email))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// update_profile
    ///
    /// `COALESCE` keeps columns whose field in `req` is `None`.
    async fn update_profile(&self, id: i64, req: &UpdateUserRequest) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), phone = COALESCE($4, phone) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(req.first_name.as_deref())
            .bind(req.last_name.as_deref())
            .bind(req.phone.as_deref())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_user_image(&self, id: i64, image: &str) -> RepoResult<Option<User>> {
        let sql = format!("UPDATE users SET image = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(image)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_ads(&self) -> RepoResult<Vec<Ad>> {
        let sql = format!("SELECT {AD_COLUMNS} FROM ads ORDER BY created_at DESC, id DESC");
        Ok(sqlx::query_as::<_, Ad>(&sql).fetch_all(&self.pool).await?)
    }

    async fn list_ads_by_author(&self, author_id: i64) -> RepoResult<Vec<Ad>> {
        let sql = format!(
            "SELECT {AD_COLUMNS} FROM ads WHERE author_id = $1 ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, Ad>(&sql)
            .bind(author_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_ad(&self, id: i64) -> RepoResult<Option<Ad>> {
        let sql = format!("SELECT {AD_COLUMNS} FROM ads WHERE id = $1");
        Ok(sqlx::query_as::<_, Ad>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_ad_details(&self, id: i64) -> RepoResult<Option<AdDetails>> {
        Ok(sqlx::query_as::<_, AdDetails>(
            r#"
            SELECT a.id, u.first_name AS author_first_name, u.last_name AS author_last_name,
                   a.description, u.email, a.image, u.phone, a.price, a.title
            FROM ads a
            JOIN users u ON a.author_id = u.id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_ad(&self, author_id: i64, req: &CreateOrUpdateAd) -> RepoResult<Ad> {
        let sql = format!(
            "INSERT INTO ads (author_id, title, description, price) VALUES ($1, $2, $3, $4) \
             RETURNING {AD_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Ad>(&sql)
            .bind(author_id)
            .bind(&req.title)
            .bind(&req.description)
            .bind(req.price)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_ad(&self, id: i64, req: &CreateOrUpdateAd) -> RepoResult<Option<Ad>> {
        let sql = format!(
            "UPDATE ads SET title = $2, description = $3, price = $4 WHERE id = $1 \
             RETURNING {AD_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Ad>(&sql)
            .bind(id)
            .bind(&req.title)
            .bind(&req.description)
            .bind(req.price)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_ad_image(&self, id: i64, image: &str) -> RepoResult<Option<Ad>> {
        let sql = format!("UPDATE ads SET image = $2 WHERE id = $1 RETURNING {AD_COLUMNS}");
        Ok(sqlx::query_as::<_, Ad>(&sql)
            .bind(id)
            .bind(image)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// delete_ad
    ///
    /// Comments go with the ad (`ON DELETE CASCADE`).
    async fn delete_ad(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM ads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_comments(&self, ad_id: i64) -> RepoResult<Vec<CommentDto>> {
        Ok(sqlx::query_as::<_, CommentDto>(
            r#"
            SELECT c.id, c.author_id, u.image AS author_image, u.first_name AS author_first_name,
                   c.created_at, c.text
            FROM comments c
            JOIN users u ON c.author_id = u.id
            WHERE c.ad_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(ad_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_comment(&self, ad_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(
            "SELECT id, ad_id, author_id, text, created_at FROM comments WHERE id = $1 AND ad_id = $2",
        )
        .bind(comment_id)
        .bind(ad_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// add_comment
    ///
    /// Inserts and joins with `users` in one statement to return the enriched view.
    async fn add_comment(&self, ad_id: i64, author_id: i64, text: &str) -> RepoResult<CommentDto> {
        Ok(sqlx::query_as::<_, CommentDto>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (ad_id, author_id, text) VALUES ($1, $2, $3)
                RETURNING id, author_id, text, created_at
            )
            SELECT i.id, i.author_id, u.image AS author_image, u.first_name AS author_first_name,
                   i.created_at, i.text
            FROM inserted i JOIN users u ON i.author_id = u.id
            "#,
        )
        .bind(ad_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_comment(
        &self,
        ad_id: i64,
        comment_id: i64,
        text: &str,
    ) -> RepoResult<Option<CommentDto>> {
        Ok(sqlx::query_as::<_, CommentDto>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = $3 WHERE id = $1 AND ad_id = $2
                RETURNING id, author_id, text, created_at
            )
            SELECT d.id, d.author_id, u.image AS author_image, u.first_name AS author_first_name,
                   d.created_at, d.text
            FROM updated d JOIN users u ON d.author_id = u.id
            "#,
        )
        .bind(comment_id)
        .bind(ad_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_comment(&self, ad_id: i64, comment_id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1 AND ad_id = $2")
            .bind(comment_id)
            .bind(ad_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    ads: BTreeMap<i64, Ad>,
    comments: BTreeMap<i64, Comment>,
    next_user_id: i64,
    next_ad_id: i64,
    next_comment_id: i64,
}

impl Tables {
    fn comment_view(&self, comment: &Comment) -> CommentDto {
        let author = self.users.get(&comment.author_id);
        CommentDto {
            id: comment.id,
            author_id: comment.author_id,
            author_image: author.and_then(|u| u.image.clone()),
            author_first_name: author.map(|u| u.first_name.clone()).unwrap_or_default(),
            created_at: comment.created_at,
            text: comment.text.clone(),
        }
    }
}

/// InMemoryRepository
///
/// `Repository` kept in process memory behind a single `RwLock`. Used by tests and
/// local experiments; enforces the same unique-email rule and cascade as the schema.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> RepoResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|u| u.email == email))
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict(user.email));
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            image: None,
            role: user.role,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn update_profile(&self, id: i64, req: &UpdateUserRequest) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            if let Some(first_name) = &req.first_name {
                user.first_name = first_name.clone();
            }
            if let Some(last_name) = &req.last_name {
                user.last_name = last_name.clone();
            }
            if let Some(phone) = &req.phone {
                user.phone = phone.clone();
            }
            user.clone()
        }))
    }

    async fn set_user_image(&self, id: i64, image: &str) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.image = Some(image.to_string());
            user.clone()
        }))
    }

    async fn list_ads(&self) -> RepoResult<Vec<Ad>> {
        let tables = self.tables.read().await;
        Ok(tables.ads.values().rev().cloned().collect())
    }

    async fn list_ads_by_author(&self, author_id: i64) -> RepoResult<Vec<Ad>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ads
            .values()
            .rev()
            .filter(|ad| ad.author_id == author_id)
            .cloned()
            .collect())
    }

    async fn find_ad(&self, id: i64) -> RepoResult<Option<Ad>> {
        Ok(self.tables.read().await.ads.get(&id).cloned())
    }

    async fn find_ad_details(&self, id: i64) -> RepoResult<Option<AdDetails>> {
        let tables = self.tables.read().await;
        Ok(tables.ads.get(&id).and_then(|ad| {
            tables.users.get(&ad.author_id).map(|author| AdDetails {
                id: ad.id,
                author_first_name: author.first_name.clone(),
                author_last_name: author.last_name.clone(),
                description: ad.description.clone(),
                email: author.email.clone(),
                image: ad.image.clone(),
                phone: author.phone.clone(),
                price: ad.price,
                title: ad.title.clone(),
            })
        }))
    }

    async fn create_ad(&self, author_id: i64, req: &CreateOrUpdateAd) -> RepoResult<Ad> {
        let mut tables = self.tables.write().await;
        tables.next_ad_id += 1;
        let ad = Ad {
            id: tables.next_ad_id,
            author_id,
            title: req.title.clone(),
            description: req.description.clone(),
            price: req.price,
            image: None,
            created_at: Utc::now(),
        };
        tables.ads.insert(ad.id, ad.clone());
        Ok(ad)
    }

    async fn update_ad(&self, id: i64, req: &CreateOrUpdateAd) -> RepoResult<Option<Ad>> {
        let mut tables = self.tables.write().await;
        Ok(tables.ads.get_mut(&id).map(|ad| {
            ad.title = req.title.clone();
            ad.description = req.description.clone();
            ad.price = req.price;
            ad.clone()
        }))
    }

    async fn set_ad_image(&self, id: i64, image: &str) -> RepoResult<Option<Ad>> {
        let mut tables = self.tables.write().await;
        Ok(tables.ads.get_mut(&id).map(|ad| {
            ad.image = Some(image.to_string());
            ad.clone()
        }))
    }

    async fn delete_ad(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.ads.remove(&id).is_some();
        if removed {
            tables.comments.retain(|_, c| c.ad_id != id);
        }
        Ok(removed)
    }

    async fn list_comments(&self, ad_id: i64) -> RepoResult<Vec<CommentDto>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.ad_id == ad_id)
            .map(|c| tables.comment_view(c))
            .collect())
    }

    async fn find_comment(&self, ad_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .get(&comment_id)
            .filter(|c| c.ad_id == ad_id)
            .cloned())
    }

    async fn add_comment(&self, ad_id: i64, author_id: i64, text: &str) -> RepoResult<CommentDto> {
        let mut tables = self.tables.write().await;
        tables.next_comment_id += 1;
        let comment = Comment {
            id: tables.next_comment_id,
            ad_id,
            author_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        let view = tables.comment_view(&comment);
        tables.comments.insert(comment.id, comment);
        Ok(view)
    }

    async fn update_comment(
        &self,
        ad_id: i64,
        comment_id: i64,
        text: &str,
    ) -> RepoResult<Option<CommentDto>> {
        let mut tables = self.tables.write().await;
        let updated = match tables.comments.get_mut(&comment_id) {
            Some(comment) if comment.ad_id == ad_id => {
                comment.text = text.to_string();
                Some(comment.clone())
            }
            _ => None,
        };
        Ok(updated.map(|c| tables.comment_view(&c)))
    }

    async fn delete_comment(&self, ad_id: i64, comment_id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let matches = tables
            .comments
            .get(&comment_id)
            .is_some_and(|c| c.ad_id == ad_id);
        if matches {
            tables.comments.remove(&comment_id);
        }
        Ok(matches)
    }
}
