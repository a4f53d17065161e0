use std::{fmt, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    auth::{hmac::KeyedHasher, password::PasswordHasher, token},
    error::ModelError,
    models::{
        store::{Store, StoreError},
        validation::{run_chain, Validate},
    },
};

/// Minimum plaintext password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Minimum decoded size of a remember token, in bytes.
pub const MIN_REMEMBER_BYTES: usize = 32;

/// Storage-level unique constraint on `users.email`.
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,16}$").expect("valid email regex");
}

/// User record. `password` and `remember` are transient plaintexts and are
/// never written to storage.
#[derive(Clone, Default, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[sqlx(skip)]
    pub password: String,
    pub password_hash: String,
    #[sqlx(skip)]
    pub remember: String,
    pub remember_hash: String,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStep {
    PasswordRequired,
    PasswordMinLength,
    HashPassword,
    PasswordHashRequired,
    SetRememberIfUnset,
    RememberMinBytes,
    HashRemember,
    RememberHashRequired,
    NormalizeEmail,
    RequireEmail,
    EmailFormat,
    EmailIsAvailable,
    IdGreaterThanZero,
}

pub const CREATE_STEPS: &[UserStep] = &[
    UserStep::PasswordRequired,
    UserStep::PasswordMinLength,
    UserStep::HashPassword,
    UserStep::PasswordHashRequired,
    UserStep::SetRememberIfUnset,
    UserStep::RememberMinBytes,
    UserStep::HashRemember,
    UserStep::RememberHashRequired,
    UserStep::NormalizeEmail,
    UserStep::RequireEmail,
    UserStep::EmailFormat,
    UserStep::EmailIsAvailable,
];

pub const UPDATE_STEPS: &[UserStep] = &[
    UserStep::PasswordMinLength,
    UserStep::HashPassword,
    UserStep::PasswordHashRequired,
    UserStep::RememberMinBytes,
    UserStep::HashRemember,
    UserStep::RememberHashRequired,
    UserStep::NormalizeEmail,
    UserStep::RequireEmail,
    UserStep::EmailFormat,
    UserStep::EmailIsAvailable,
];

const DELETE_STEPS: &[UserStep] = &[UserStep::IdGreaterThanZero];

/// Validating front of the user store. Every write passes through the
/// step chains above before it reaches storage.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    passwords: PasswordHasher,
    hmac: KeyedHasher,
}

pub fn normalize_email(email: &str) -> String {
    email.to_lowercase().trim().to_string()
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, passwords: PasswordHasher, hmac: KeyedHasher) -> Self {
        Self {
            store,
            passwords,
            hmac,
        }
    }

    pub async fn by_id(&self, id: i64) -> Result<User, ModelError> {
        self.store.user_by_id(id).await?.ok_or(ModelError::NotFound)
    }

    /// Looks up by email, normalizing first so the match is case and
    /// whitespace insensitive.
    pub async fn by_email(&self, email: &str) -> Result<User, ModelError> {
        let mut user = User {
            email: email.to_string(),
            ..User::default()
        };
        run_chain(self, &mut user, &[UserStep::NormalizeEmail]).await?;
        self.store
            .user_by_email(&user.email)
            .await?
            .ok_or(ModelError::NotFound)
    }

    /// Looks up by remember token. Storage only ever sees the digest.
    pub async fn by_remember(&self, token: &str) -> Result<User, ModelError> {
        let mut user = User {
            remember: token.to_string(),
            ..User::default()
        };
        run_chain(self, &mut user, &[UserStep::HashRemember]).await?;
        if user.remember_hash.is_empty() {
            return Err(ModelError::NotFound);
        }
        self.store
            .user_by_remember_hash(&user.remember_hash)
            .await?
            .ok_or(ModelError::NotFound)
    }

    pub async fn create(&self, user: &mut User) -> Result<(), ModelError> {
        run_chain(self, user, CREATE_STEPS).await?;
        self.store.create_user(user).await.map_err(conflict_to_model)?;
        debug!(user_id = user.id, "user created");
        Ok(())
    }

    /// Updates an existing user; an ID that matches no row is `NotFound`.
    pub async fn update(&self, user: &mut User) -> Result<(), ModelError> {
        if user.id <= 0 {
            return Err(ModelError::NotFound);
        }
        run_chain(self, user, UPDATE_STEPS).await?;
        self.store.update_user(user).await.map_err(conflict_to_model)?;
        debug!(user_id = user.id, "user updated");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), ModelError> {
        let mut user = User {
            id,
            ..User::default()
        };
        run_chain(self, &mut user, DELETE_STEPS).await?;
        self.store.delete_user(id).await?;
        Ok(())
    }

    /// Checks an email/password pair. Unknown email yields `NotFound`, a
    /// wrong password `PasswordIncorrect`; callers should not tell them apart.
    /// Both paths pay for one Argon2 verification.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, ModelError> {
        let hasher = self.passwords.clone();
        let plain = password.to_string();
        let user = match self.by_email(email).await {
            Ok(user) => user,
            Err(ModelError::NotFound) => {
                tokio::task::spawn_blocking(move || hasher.verify_decoy(&plain))
                    .await
                    .context("password verification task")??;
                debug!("login for unknown email");
                return Err(ModelError::NotFound);
            }
            Err(e) => return Err(e),
        };
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&hash, &plain))
            .await
            .context("password verification task")??;
        if !matches {
            warn!(user_id = user.id, "password mismatch");
            return Err(ModelError::PasswordIncorrect);
        }
        Ok(user)
    }

    async fn hash_password(&self, user: &mut User) -> Result<(), ModelError> {
        if user.password.is_empty() {
            return Ok(());
        }
        let hasher = self.passwords.clone();
        let plain = std::mem::take(&mut user.password);
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .context("password hashing task")??;
        user.password_hash = hash;
        Ok(())
    }

    async fn email_is_available(&self, user: &User) -> Result<(), ModelError> {
        match self.store.user_by_email(&user.email).await? {
            Some(existing) if existing.id != user.id => Err(ModelError::EmailTaken),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Validate<User> for UserService {
    type Step = UserStep;

    async fn apply(&self, step: UserStep, user: &mut User) -> Result<(), ModelError> {
        match step {
            UserStep::PasswordRequired => {
                if user.password.is_empty() {
                    return Err(ModelError::PasswordRequired);
                }
            }
            UserStep::PasswordMinLength => {
                if !user.password.is_empty() && user.password.chars().count() < MIN_PASSWORD_LEN {
                    return Err(ModelError::PasswordTooShort);
                }
            }
            UserStep::HashPassword => self.hash_password(user).await?,
            UserStep::PasswordHashRequired => {
                if user.password_hash.is_empty() {
                    return Err(ModelError::PasswordRequired);
                }
            }
            UserStep::SetRememberIfUnset => {
                if user.remember.is_empty() {
                    user.remember = token::remember_token()?;
                }
            }
            UserStep::RememberMinBytes => {
                if !user.remember.is_empty()
                    && token::decoded_len(&user.remember).unwrap_or(0) < MIN_REMEMBER_BYTES
                {
                    return Err(ModelError::RememberTooShort);
                }
            }
            UserStep::HashRemember => {
                if !user.remember.is_empty() {
                    user.remember_hash = self.hmac.hash(&user.remember);
                }
            }
            UserStep::RememberHashRequired => {
                if user.remember_hash.is_empty() {
                    return Err(ModelError::RememberRequired);
                }
            }
            UserStep::NormalizeEmail => user.email = normalize_email(&user.email),
            UserStep::RequireEmail => {
                if user.email.is_empty() {
                    return Err(ModelError::EmailRequired);
                }
            }
            UserStep::EmailFormat => {
                if !user.email.is_empty() && !EMAIL_RE.is_match(&user.email) {
                    return Err(ModelError::EmailInvalid);
                }
            }
            UserStep::EmailIsAvailable => self.email_is_available(user).await?,
            UserStep::IdGreaterThanZero => {
                if user.id <= 0 {
                    return Err(ModelError::InvalidId);
                }
            }
        }
        Ok(())
    }
}

/// Storage is the uniqueness authority: a lost race on the email
/// constraint reads the same as the advisory pre-check.
fn conflict_to_model(err: StoreError) -> ModelError {
    match err {
        StoreError::Conflict(ref constraint) if constraint == EMAIL_CONSTRAINT => ModelError::EmailTaken,
        other => other.into(),
    }
}
