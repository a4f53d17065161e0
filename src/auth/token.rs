use anyhow::Context;
use base64ct::{Base64Url, Encoding};
use rand::{rngs::OsRng, RngCore};

/// Bytes of randomness in a freshly issued remember token.
pub const REMEMBER_TOKEN_BYTES: usize = 32;

/// Random bytes from the OS, base64url encoded. A failing entropy source is
/// reported, never papered over.
pub fn random_string(n_bytes: usize) -> anyhow::Result<String> {
    let mut buf = vec![0u8; n_bytes];
    OsRng
        .try_fill_bytes(&mut buf)
        .context("read from OS randomness source")?;
    Ok(Base64Url::encode_string(&buf))
}

pub fn remember_token() -> anyhow::Result<String> {
    random_string(REMEMBER_TOKEN_BYTES)
}

/// Number of underlying bytes in an encoded token, `None` if it does not decode.
pub fn decoded_len(token: &str) -> Option<usize> {
    Base64Url::decode_vec(token).ok().map(|bytes| bytes.len())
}
