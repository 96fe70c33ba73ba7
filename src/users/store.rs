use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::domain::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record with this email already exists")]
    DuplicateEmail,

    #[error("record not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            other => StoreError::Unavailable(other),
        }
    }
}

/// Persistence seam for users. `PgUserStore` is the production
/// implementation; `MemoryUserStore` backs the tests.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, display_name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, display_name, bio, avatar_url,
                      preferences, created_at, updated_at, last_login_at
            "#,
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.display_name)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, bio, avatar_url,
                   preferences, created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, bio, avatar_url,
                   preferences, created_at, updated_at, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        // id, email and created_at are immutable; updated_at comes from the
        // database clock so it stays monotonic.
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET display_name = $2,
                bio = $3,
                avatar_url = $4,
                preferences = $5,
                password_hash = $6,
                last_login_at = $7,
                updated_at = now()
            WHERE id = $1
            RETURNING id, email, password_hash, display_name, bio, avatar_url,
                      preferences, created_at, updated_at, last_login_at
            "#,
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(&user.preferences)
        .bind(&user.password_hash)
        .bind(user.last_login_at)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}

/// In-memory store with the same contract, including email uniqueness.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            display_name: new.display_name,
            bio: String::new(),
            avatar_url: String::new(),
            preferences: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        let existing = users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        let mut updated = user.clone();
        updated.email = existing.email.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = OffsetDateTime::now_utc().max(existing.updated_at);
        *existing = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            display_name: "Test User".into(),
        }
    }

    #[tokio::test]
    async fn create_then_fetch_roundtrip() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("a@x.com")).await.expect("create");

        let by_id = store.get_by_id(created.id).await.expect("get_by_id");
        let by_email = store.get_by_email("a@x.com").await.expect("get_by_email");

        assert_eq!(by_id.id, created.id);
        assert_eq!(by_id.email, created.email);
        assert_eq!(by_id.password_hash, created.password_hash);
        assert_eq!(by_id.display_name, created.display_name);
        assert_eq!(by_email.id, created.id);
        assert!(by_id.last_login_at.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.expect("create");
        let err = store.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = MemoryUserStore::new();
        assert!(matches!(
            store.get_by_id(Uuid::new_v4()).await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.get_by_email("nobody@x.com").await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn update_mutates_fields_and_bumps_updated_at() {
        let store = MemoryUserStore::new();
        let mut user = store.create(new_user("a@x.com")).await.expect("create");

        user.bio = "espresso enjoyer".into();
        user.last_login_at = Some(OffsetDateTime::now_utc());
        let updated = store.update(&user).await.expect("update");

        assert_eq!(updated.bio, "espresso enjoyer");
        assert!(updated.last_login_at.is_some());
        assert!(updated.updated_at >= updated.created_at);
        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn update_of_unknown_user_is_not_found() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.expect("create");
        let mut ghost = user.clone();
        ghost.id = Uuid::new_v4();
        assert!(matches!(
            store.update(&ghost).await.unwrap_err(),
            StoreError::NotFound
        ));
    }
}
