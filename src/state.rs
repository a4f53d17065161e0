use std::sync::Arc;

use argon2::Params;

use crate::{
    auth::{hmac::KeyedHasher, jwt::TokenKeys, password::PasswordHasher},
    config::{AppConfig, AuthConfig},
    db::PgStore,
    models::{friend::FriendService, store::Store, user::UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
    pub friends: FriendService,
    pub keys: TokenKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Arc::new(PgStore::connect(&config.database_url).await?) as Arc<dyn Store>;
        let passwords = password_hasher(&config.auth)?;
        Ok(Self::from_parts(config, store, passwords))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn Store>, passwords: PasswordHasher) -> Self {
        let hmac = KeyedHasher::new(&config.auth.hmac_key);
        let keys = TokenKeys::new(&config.auth.jwt_secret);
        Self {
            users: UserService::new(store.clone(), passwords, hmac),
            friends: FriendService::new(store),
            keys,
            config,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::{
            auth::password::test_params,
            config::Environment,
            models::memory::MemoryStore,
        };

        let config = Arc::new(AppConfig {
            env: Environment::Dev,
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "postgres://unused".into(),
            auth: AuthConfig {
                pepper: "test-pepper".into(),
                hmac_key: "test-hmac-key".into(),
                jwt_secret: "test-jwt-secret".into(),
                password_memory_kib: None,
                password_iterations: None,
            },
        });
        let passwords = PasswordHasher::new(config.auth.pepper.as_str()).with_params(test_params());
        Self::from_parts(config, Arc::new(MemoryStore::default()), passwords)
    }
}

fn password_hasher(auth: &AuthConfig) -> anyhow::Result<PasswordHasher> {
    let mut hasher = PasswordHasher::new(auth.pepper.as_str());
    if auth.password_memory_kib.is_some() || auth.password_iterations.is_some() {
        let params = Params::new(
            auth.password_memory_kib.unwrap_or(Params::DEFAULT_M_COST),
            auth.password_iterations.unwrap_or(Params::DEFAULT_T_COST),
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        hasher = hasher.with_params(params);
    }
    hasher.prime()?;
    Ok(hasher)
}
