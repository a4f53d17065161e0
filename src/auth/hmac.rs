use std::sync::Arc;

use base64ct::{Base64Url, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Keyed digest used to index remember tokens without storing them.
#[derive(Clone)]
pub struct KeyedHasher {
    key: Arc<[u8]>,
}

impl KeyedHasher {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::from(key.as_ref()),
        }
    }

    /// HMAC-SHA256 of `input`, base64url encoded (44 chars).
    pub fn hash(&self, input: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(input.as_bytes());
        Base64Url::encode_string(&mac.finalize().into_bytes())
    }
}
