use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::middleware::CurrentUser,
    error::ModelError,
    friends::dto::{CreateFriendRequest, UpdateFriendRequest},
    models::friend::Friend,
    state::AppState,
};

type Rejection = (StatusCode, String);

pub fn friend_routes() -> Router<AppState> {
    Router::new()
        .route("/api/friends", get(list_friends).post(create_friend))
        .route("/api/friends/:id", put(update_friend).delete(delete_friend))
}

/// Loads a relation the caller owns. Someone else's relation reads as
/// missing.
async fn owned_friend(state: &AppState, owner_id: i64, id: i64) -> Result<Friend, Rejection> {
    match state.friends.by_id(id).await {
        Ok(f) if f.user_id == owner_id => Ok(f),
        Ok(_) => {
            warn!(owner_id, friend_row = id, "friend relation owned by another user");
            Err(ModelError::NotFound.into_rejection())
        }
        Err(e) => Err(e.into_rejection()),
    }
}

#[instrument(skip_all)]
pub async fn list_friends(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Friend>>, Rejection> {
    let friends = state
        .friends
        .by_user_id(user.id)
        .await
        .map_err(ModelError::into_rejection)?;
    Ok(Json(friends))
}

#[instrument(skip_all)]
pub async fn create_friend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateFriendRequest>,
) -> Result<(StatusCode, Json<Friend>), Rejection> {
    let mut friend = Friend::pending(user.id, body.friend_id);
    state
        .friends
        .create(&mut friend)
        .await
        .map_err(ModelError::into_rejection)?;
    info!(user_id = user.id, friend_id = friend.friend_id, "friend request created");
    Ok((StatusCode::CREATED, Json(friend)))
}

#[instrument(skip_all)]
pub async fn update_friend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateFriendRequest>,
) -> Result<Json<Friend>, Rejection> {
    let mut friend = owned_friend(&state, user.id, id).await?;
    friend.status = body.status;
    state
        .friends
        .update(&mut friend)
        .await
        .map_err(ModelError::into_rejection)?;
    Ok(Json(friend))
}

#[instrument(skip_all)]
pub async fn delete_friend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, Rejection> {
    let friend = owned_friend(&state, user.id, id).await?;
    state
        .friends
        .delete(friend.id)
        .await
        .map_err(ModelError::into_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}
