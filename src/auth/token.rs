use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes behind an opaque session token (192 bits).
const TOKEN_BYTES: usize = 24;

pub const TOKEN_HEADER: &str = "X-Auth-Token";

/// Mint an opaque session token: 24 bytes from the OS CSPRNG, URL-safe
/// base64 without padding.
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
