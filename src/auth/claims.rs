use serde::{Deserialize, Serialize};

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i64, // owning user
    pub exp: i64,     // expires at (unix timestamp)
}
