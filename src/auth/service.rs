use std::sync::Arc;

use axum::extract::FromRef;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::auth::jwt::{JwtKeys, TokenPair};
use crate::auth::password::{hash_password, verify_password};
use crate::state::AppState;
use crate::users::domain::{NewUser, User};
use crate::users::store::{StoreError, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("a user with this email already exists")]
    EmailTaken,

    /// Covers both unknown email and wrong password so callers cannot tell
    /// which one happened.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password hashing failed")]
    Hashing(#[source] anyhow::Error),

    #[error("token signing failed")]
    TokenSign(#[source] anyhow::Error),
}

/// Orchestrates the user store, credential hashing and token issuance.
/// Stateless between calls; holds only the store handle and the signing keys.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            keys: JwtKeys::from_ref(state),
        }
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(User, TokenPair), AuthError> {
        match self.users.get_by_email(email).await {
            Ok(_) => return Err(AuthError::EmailTaken),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = hash_password(password).map_err(AuthError::Hashing)?;

        // The existence check above races with concurrent registrations; the
        // store's unique constraint is what actually decides.
        let user = self
            .users
            .create(NewUser {
                email: email.to_string(),
                password_hash,
                display_name: display_name.to_string(),
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail => AuthError::EmailTaken,
                other => other.into(),
            })?;

        let tokens = self.keys.sign_pair(user.id).map_err(AuthError::TokenSign)?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok((user, tokens))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let mut user = match self.users.get_by_email(email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                warn!(email = %email, "login for unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let ok = verify_password(password, &user.password_hash).map_err(AuthError::Hashing)?;
        if !ok {
            warn!(user_id = %user.id, "login with invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        user.last_login_at = Some(OffsetDateTime::now_utc());
        let user = self.users.update(&user).await?;

        let tokens = self.keys.sign_pair(user.id).map_err(AuthError::TokenSign)?;

        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok((user, tokens))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .keys
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidToken)?;

        // A refresh token for a subject that no longer exists is the same
        // unauthorized outcome as a bad token.
        let user = match self.users.get_by_id(claims.sub).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                warn!(user_id = %claims.sub, "refresh for unknown subject");
                return Err(AuthError::InvalidToken);
            }
            Err(e) => return Err(e.into()),
        };

        let tokens = self.keys.sign_pair(user.id).map_err(AuthError::TokenSign)?;

        info!(user_id = %user.id, "token pair refreshed");
        Ok(tokens)
    }
}
