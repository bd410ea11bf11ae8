use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Lowest accepted Argon2 time cost.
pub const MIN_HASH_COST: u32 = 1;
/// Highest accepted Argon2 time cost.
pub const MAX_HASH_COST: u32 = 10;

/// Failure while producing a password hash.
#[derive(Debug, Error)]
pub enum HashError {
    /// The cost factor is outside what Argon2 accepts.
    #[error("invalid hash parameters: {0}")]
    Params(String),
    /// Argon2 itself failed.
    #[error("hashing failed: {0}")]
    Hash(String),
    /// The blocking task was cancelled or panicked.
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash a password with a fresh salt. `cost` is the Argon2 time cost.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, HashError> {
    let params = Params::new(Params::DEFAULT_M_COST, cost, Params::DEFAULT_P_COST, None)
        .map_err(|e| HashError::Params(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| HashError::Hash(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored hash. Salt and parameters are read
/// from the hash itself. An unparsable hash never verifies.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("stored password hash is malformed: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed_hash)
        .is_ok()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(plaintext: String, cost: u32) -> Result<String, HashError> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext, cost)).await?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(plaintext: String, hash: String) -> Result<bool, HashError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&plaintext, &hash)).await?)
}
