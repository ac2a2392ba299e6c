use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};

/// Argon2id cost used when the configuration does not override it.
pub const DEFAULT_MEMORY_KIB: u32 = 19 * 1024;
pub const DEFAULT_ITERATIONS: u32 = 2;

/// Checks a plaintext secret against a stored one-way hash.
pub trait SecretVerifier: Send + Sync {
    fn verify(&self, secret: &str, stored_hash: &str) -> bool;
}

/// Verifies Argon2 PHC strings. Cost parameters and salt are read from the hash itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl SecretVerifier for Argon2Verifier {
    fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        verify_password(stored_hash, secret)
    }
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Produces salted Argon2id PHC strings for new or rotated secrets.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl Default for SecretHasher {
    fn default() -> Self { Self { params: Params::default() } }
}

impl SecretHasher {
    pub fn with_params(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None).map_err(|e| anyhow!(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
        Ok(phc)
    }
}
