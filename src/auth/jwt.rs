use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::claims::Claims;

/// Lifetime of every issued signed token. There is no refresh.
pub const TOKEN_TTL: Duration = Duration::hours(1);

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Signing and verification keys derived from the server secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issues a token for `user_id` expiring one hour from now.
    pub fn sign(&self, user_id: i64) -> anyhow::Result<String> {
        self.sign_until(user_id, OffsetDateTime::now_utc() + TOKEN_TTL)
    }

    pub(crate) fn sign_until(&self, user_id: i64, expires_at: OffsetDateTime) -> anyhow::Result<String> {
        let claims = Claims {
            user_id,
            exp: expires_at.unix_timestamp(),
        };
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    /// Checks algorithm family, signature and expiry, in that order.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64UrlUnpadded, Encoding};

    fn keys() -> TokenKeys {
        TokenKeys::new("dev-secret")
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = keys();
        let token = keys.sign(42).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.user_id, 42);
    }

    #[test]
    fn expiry_is_one_hour_out() {
        let keys = keys();
        let before = OffsetDateTime::now_utc().unix_timestamp();
        let claims = keys.verify(&keys.sign(7).expect("sign")).expect("verify");
        let after = OffsetDateTime::now_utc().unix_timestamp();
        assert!(claims.exp >= before + 3600 && claims.exp <= after + 3600);
    }

    #[test]
    fn token_expired_one_second_ago_is_rejected() {
        let keys = keys();
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);
        let token = keys.sign_until(9, past).expect("sign");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn token_expiring_in_one_second_is_accepted() {
        let keys = keys();
        let soon = OffsetDateTime::now_utc() + Duration::seconds(1);
        let token = keys.sign_until(9, soon).expect("sign");
        assert_eq!(keys.verify(&token).expect("verify").user_id, 9);
    }

    #[test]
    fn verify_rejects_other_secret() {
        let token = TokenKeys::new("secret-a").sign(1).expect("sign");
        assert!(TokenKeys::new("secret-b").verify(&token).is_err());
    }

    #[test]
    fn verify_accepts_other_hmac_variants() {
        let claims = Claims {
            user_id: 3,
            exp: (OffsetDateTime::now_utc() + TOKEN_TTL).unix_timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .expect("encode");
        assert_eq!(keys().verify(&token).expect("verify").user_id, 3);
    }

    #[test]
    fn verify_rejects_unsigned_token() {
        let exp = (OffsetDateTime::now_utc() + TOKEN_TTL).unix_timestamp();
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = Base64UrlUnpadded::encode_string(
            format!(r#"{{"user_id":1,"exp":{exp}}}"#).as_bytes(),
        );
        let forged = format!("{header}.{payload}.");
        assert!(keys().verify(&forged).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(keys().verify("not.a.token").is_err());
        assert!(keys().verify("").is_err());
    }
}
