use std::sync::{Arc, OnceLock};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

/// Plaintext behind the decoy digest. Never a real credential.
const DECOY_PLAINTEXT: &str = "decoy-password-for-unknown-accounts";

/// Peppered Argon2 hasher. The pepper is appended to every plaintext before
/// hashing and is never stored alongside the digest.
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: Arc<str>,
    params: Params,
    decoy: Arc<OnceLock<String>>,
}

impl PasswordHasher {
    pub fn new(pepper: impl Into<Arc<str>>) -> Self {
        Self {
            pepper: pepper.into(),
            params: Params::default(),
            decoy: Arc::default(),
        }
    }

    /// Overrides the Argon2 cost parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self.decoy = Arc::default();
        self
    }

    /// Computes the decoy digest up front so the first lookup of an unknown
    /// account costs the same as every later one.
    pub fn prime(&self) -> anyhow::Result<()> {
        if self.decoy.get().is_none() {
            let hash = self.hash(DECOY_PLAINTEXT)?;
            let _ = self.decoy.set(hash);
        }
        Ok(())
    }

    /// Runs a full verification against the decoy digest and discards the
    /// result. Used when there is no stored hash to check, so a missing
    /// account takes as long as a wrong password.
    pub fn verify_decoy(&self, plain: &str) -> anyhow::Result<()> {
        self.prime()?;
        if let Some(hash) = self.decoy.get() {
            self.verify(hash, plain)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn decoy_is_primed(&self) -> bool {
        self.decoy.get().is_some()
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn peppered(&self, plain: &str) -> String {
        let mut buf = String::with_capacity(plain.len() + self.pepper.len());
        buf.push_str(plain);
        buf.push_str(&self.pepper);
        buf
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(self.peppered(plain).as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored digest is unreadable.
    pub fn verify(&self, hash: &str, plain: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        // Parameters come from the encoded digest, so a hash made under
        // older costs still verifies.
        Ok(self
            .argon2()
            .verify_password(self.peppered(plain).as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
pub(crate) fn test_params() -> Params {
    Params::new(Params::MIN_M_COST, 1, 1, None).expect("valid argon2 params")
}
