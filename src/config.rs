use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    fn from_env() -> anyhow::Result<Self> {
        match std::env::var("APP_ENV").as_deref() {
            Ok("prod") | Ok("production") => Ok(Self::Prod),
            Ok("dev") | Ok("development") | Err(_) => Ok(Self::Dev),
            Ok(other) => anyhow::bail!("unknown APP_ENV `{other}`"),
        }
    }
}

/// Process-wide secrets, read once at startup and handed to the components
/// that need them.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub pepper: String,
    pub hmac_key: String,
    pub jwt_secret: String,
    /// Argon2 memory cost in KiB and iteration count; `None` keeps the
    /// library defaults.
    pub password_memory_kib: Option<u32>,
    pub password_iterations: Option<u32>,
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub env: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let env = Environment::from_env()?;
        let database_url = std::env::var("DATABASE_URL")?;
        let auth = AuthConfig {
            pepper: secret(env, "PASSWORD_PEPPER", "dev-pepper")?,
            hmac_key: secret(env, "HMAC_KEY", "dev-hmac-key")?,
            jwt_secret: secret(env, "JWT_SECRET", "dev-jwt-secret")?,
            password_memory_kib: parsed("PASSWORD_HASH_MEMORY_KIB")?,
            password_iterations: parsed("PASSWORD_HASH_ITERATIONS")?,
        };
        Ok(Self {
            env,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
            database_url,
            auth,
        })
    }

    pub fn is_prod(&self) -> bool {
        self.env == Environment::Prod
    }
}

fn parsed(name: &str) -> anyhow::Result<Option<u32>> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(v.parse().with_context(|| format!("{name} must be an integer"))?)),
        Err(_) => Ok(None),
    }
}

/// Reads a secret; only a dev environment may fall back to a built-in value.
fn secret(env: Environment, name: &str, dev_default: &str) -> anyhow::Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ if env == Environment::Prod => anyhow::bail!("{name} must be set in production"),
        _ => {
            warn!(var = name, "secret not set; using development default");
            Ok(dev_default.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prod_refuses_missing_secret() {
        let err = secret(Environment::Prod, "CHATLINE_TEST_UNSET_SECRET", "x").unwrap_err();
        assert!(err.to_string().contains("CHATLINE_TEST_UNSET_SECRET"));
    }

    #[test]
    fn dev_falls_back_to_default() {
        let v = secret(Environment::Dev, "CHATLINE_TEST_UNSET_SECRET", "fallback").expect("dev");
        assert_eq!(v, "fallback");
    }
}
