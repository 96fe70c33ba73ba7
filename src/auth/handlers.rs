use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::auth::dto::{
    LoginData, LoginRequest, RefreshData, RefreshRequest, RegisterData, RegisterRequest,
};
use crate::auth::service::AuthService;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are trimmed and lowercased before any lookup or write; this is the
/// fixed case policy for the login key.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn decode_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "undecodable request body");
            Err(ApiError::InvalidRequest("Invalid request format".into()))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterData>>), ApiError> {
    let mut payload = decode_body(payload)?;
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        warn!("missing display name");
        return Err(ApiError::Validation("Display name is required".into()));
    }

    let auth = AuthService::from_ref(&state);
    let (user, tokens) = auth
        .register(&payload.email, &payload.password, display_name)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::success(RegisterData {
            user: (&user).into(),
            token: tokens.access,
            refresh_token: tokens.refresh,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginData>>, ApiError> {
    let mut payload = decode_body(payload)?;
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let auth = AuthService::from_ref(&state);
    let (user, tokens) = auth.login(&payload.email, &payload.password).await?;

    Ok(ApiResponse::success(LoginData {
        user: (&user).into(),
        token: tokens.access,
        refresh_token: tokens.refresh,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RefreshData>>, ApiError> {
    let payload = decode_body(payload)?;

    let auth = AuthService::from_ref(&state);
    let tokens = auth.refresh(&payload.refresh_token).await?;

    Ok(ApiResponse::success(RefreshData {
        token: tokens.access,
        refresh_token: tokens.refresh,
    }))
}
