use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

pub mod password;

/// Random bytes behind every bearer/activation token.
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Length of the encoded plaintext handed to clients.
pub const TOKEN_PLAINTEXT_LEN: usize = 22;

/// Fresh token plaintext from the OS CSPRNG, base64url without padding.
pub fn generate_plaintext() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Deterministic SHA-256 digest used as the stored lookup key.
///
/// Tokens are looked up by exact digest match, so there is no per-row salt.
pub fn digest(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}
