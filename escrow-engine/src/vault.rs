//! Encrypted fulfillment storage
//!
//! Fulfillment secrets live AES-256-GCM encrypted on the escrow record
//! itself, so each secret is keyed by `escrow_id` through the record's own
//! primary key. Keying by `(disaster_type, region)` would silently overwrite
//! secrets when multiple donors target the same disaster.
//!
//! Wire format: 12-byte random nonce prepended to the ciphertext.

use crate::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key, Nonce,
};

/// Symmetric encrypt/decrypt seam for secrets at rest
pub trait SecretStore: Send + Sync {
    /// Encrypt a plaintext secret
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a previously encrypted secret
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// AES-256-GCM vault for fulfillment preimages
pub struct FulfillmentVault {
    cipher: Aes256Gcm,
}

impl FulfillmentVault {
    /// Create a vault from a 32-byte master key
    pub fn new(master_key: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(master_key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Load the master key from a hex-encoded environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let raw = std::env::var(var)
            .map_err(|_| Error::Config(format!("{} is not set", var)))?;
        let bytes = hex::decode(raw.trim())
            .map_err(|e| Error::Config(format!("{}: invalid hex: {}", var, e)))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Config(format!("{}: master key must be 32 bytes", var)))?;
        Ok(Self::new(&key))
    }
}

impl SecretStore for FulfillmentVault {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let encrypted = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        // Prepend nonce to ciphertext
        let mut data = Vec::with_capacity(12 + encrypted.len());
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&encrypted);

        Ok(data)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < 12 {
            return Err(Error::Decryption("Invalid encrypted data".to_string()));
        }

        let nonce = Nonce::from_slice(&ciphertext[..12]);

        self.cipher
            .decrypt(nonce, &ciphertext[12..])
            .map_err(|e| Error::Decryption(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> FulfillmentVault {
        FulfillmentVault::new(&[7u8; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let v = vault();
        let secret = b"RELIEFRAIL:flood:sylhet:120:2026-08-27T00:00:00Z:deadbeef";

        let ciphertext = v.encrypt(secret).unwrap();
        assert_ne!(&ciphertext[12..], secret.as_slice());

        let plaintext = v.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, secret);
    }

    #[test]
    fn test_distinct_nonces_per_encryption() {
        let v = vault();
        let a = v.encrypt(b"same secret").unwrap();
        let b = v.encrypt(b"same secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let ciphertext = vault().encrypt(b"secret").unwrap();

        let other = FulfillmentVault::new(&[8u8; 32]);
        assert!(matches!(other.decrypt(&ciphertext), Err(Error::Decryption(_))));
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        assert!(matches!(vault().decrypt(&[0u8; 5]), Err(Error::Decryption(_))));
    }
}
