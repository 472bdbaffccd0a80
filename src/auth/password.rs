use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tokio::task;

/// Hash a plaintext password into a PHC string.
/// Runs on the blocking pool; argon2 is deliberately CPU-heavy.
pub async fn hash(plaintext: &str) -> Result<String> {
    let plaintext = plaintext.to_string();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))
    })
    .await
    .context("Password hashing task panicked")?
}

/// Returns `Ok(false)` for a wrong password; `Err` only for a corrupt stored hash.
pub async fn matches(plaintext: &str, stored_hash: &str) -> Result<bool> {
    let plaintext = plaintext.to_string();
    let stored_hash = stored_hash.to_string();

    task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;
        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .context("Password verification task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hashed = hash("pa55word").await.unwrap();
        assert!(hashed.starts_with("$argon2"));
        assert!(matches("pa55word", &hashed).await.unwrap());
        assert!(!matches("wrong-password", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_hash_is_an_error() {
        assert!(matches("pa55word", "not-a-hash").await.is_err());
    }
}
