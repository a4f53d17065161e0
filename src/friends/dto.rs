use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateFriendRequest {
    pub friend_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFriendRequest {
    pub status: String,
}
