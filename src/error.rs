use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

use crate::models::store::StoreError;

/// Failures produced by the model layer.
///
/// Messages carry a `models: ` prefix; [`ModelError::public`] turns the
/// caller-facing ones into a display string.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("models: resource not found")]
    NotFound,
    #[error("models: incorrect password provided")]
    PasswordIncorrect,
    #[error("models: email address is required")]
    EmailRequired,
    #[error("models: email address is not valid")]
    EmailInvalid,
    #[error("models: email address is already taken")]
    EmailTaken,
    #[error("models: password is required")]
    PasswordRequired,
    #[error("models: password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("models: remember token must be at least 32 bytes")]
    RememberTooShort,
    #[error("models: remember token is required")]
    RememberRequired,
    #[error("models: friend ID is required")]
    FriendIdRequired,
    #[error("models: token provided is not valid")]
    TokenInvalid,

    // control flow only, never shown to a caller
    #[error("models: ID provided was invalid")]
    InvalidId,
    #[error("models: user ID is required")]
    UserIdRequired,

    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ModelError {
    /// Whether the message may be rendered to the caller verbatim.
    pub fn is_public(&self) -> bool {
        !matches!(
            self,
            ModelError::InvalidId
                | ModelError::UserIdRequired
                | ModelError::Store(_)
                | ModelError::Internal(_)
        )
    }

    /// Fatal failures abort the operation and surface as a 5xx.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModelError::Store(_) | ModelError::Internal(_))
    }

    /// Human-readable message: prefix dropped, first word capitalised.
    pub fn public(&self) -> String {
        let msg = self.to_string();
        let msg = msg.strip_prefix("models: ").unwrap_or(&msg);
        let mut chars = msg.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ModelError::NotFound => StatusCode::NOT_FOUND,
            ModelError::PasswordIncorrect | ModelError::TokenInvalid => StatusCode::UNAUTHORIZED,
            ModelError::EmailTaken => StatusCode::CONFLICT,
            ModelError::Store(_) | ModelError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Handler-facing rejection. Only public messages reach the caller;
    /// fatal details stay in the log.
    pub fn into_rejection(self) -> (StatusCode, String) {
        let status = self.status();
        let message = match &self {
            ModelError::PasswordIncorrect | ModelError::TokenInvalid => INVALID_CREDENTIALS.to_string(),
            e if e.is_fatal() => {
                error!(error = %e, "request failed");
                "Something went wrong".to_string()
            }
            e if e.is_public() => e.public(),
            _ => "Invalid request".to_string(),
        };
        (status, message)
    }
}

impl From<StoreError> for ModelError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing => ModelError::NotFound,
            other => ModelError::Store(other),
        }
    }
}

/// Single message for every authentication failure, so an unknown account
/// and a wrong password look the same from outside.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
