use axum::{middleware::from_fn, Router};

use crate::state::AppState;

pub mod claims;
mod dto;
pub mod handlers;
pub mod hmac;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod token;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(handlers::session_routes().route_layer(from_fn(middleware::require_user)))
}
