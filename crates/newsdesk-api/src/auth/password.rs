//! Password hashing and verification using Argon2id
//!
//! Hashes are PHC strings, so the parameters travel with the hash and
//! verification works across parameter changes. Hashing is CPU-bound; the
//! async wrappers run it on the blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use newsdesk_core::config::AuthConfig;
use thiserror::Error;

/// Shortest accepted password, in characters
pub const MIN_PASSWORD_LEN: usize = 6;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("Password task failed: {0}")]
    TaskFailed(String),
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for PasswordConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            memory_cost: config.password_memory_cost,
            time_cost: config.password_time_cost,
            parallelism: config.password_parallelism,
        }
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a plaintext password
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        config.to_params()?,
    );

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Check a plaintext password against a stored PHC hash
///
/// `Ok(false)` means the password is wrong; `Err` means the hash itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// [`hash_password_with_config`] on the blocking pool
pub async fn hash_password(password: String, config: PasswordConfig) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

/// [`verify_password`] on the blocking pool
pub async fn verify_password_async(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password_with_config("secret1", &fast()).unwrap();

        assert!(verify_password("secret1", &hash).unwrap());
        assert!(!verify_password("secret2", &hash).unwrap());
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        let hash1 = hash_password_with_config("SamePassword", &fast()).unwrap();
        let hash2 = hash_password_with_config("SamePassword", &fast()).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("SamePassword", &hash1).unwrap());
        assert!(verify_password("SamePassword", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "invalid-hash-format");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_hash_carries_parameters() {
        let hash = hash_password_with_config("secret1", &fast()).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=1024"));
        assert!(hash.contains("t=1"));
        assert!(hash.contains("p=1"));
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hash = hash_password("secret1".to_string(), fast()).await.unwrap();
        assert!(verify_password_async("secret1".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_async("nope".to_string(), hash).await.unwrap());
    }
}
