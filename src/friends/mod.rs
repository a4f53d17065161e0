use axum::{middleware::from_fn, Router};

use crate::{auth::middleware::require_user, state::AppState};

mod dto;
pub mod handlers;

/// Every friend route requires an identity.
pub fn router() -> Router<AppState> {
    handlers::friend_routes().route_layer(from_fn(require_user))
}
