use axum::{routing::get, Router};

use crate::state::AppState;

pub mod domain;
pub mod handlers;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new().route("/users/me", get(handlers::me))
}
