use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key};

use crate::traits::encryptor::CaptureEncryptor;

pub const AES_256_GCM: &str = "AES-256-GCM";
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// AES-256-GCM chunk encryptor with a random 96-bit nonce per chunk.
///
/// Sealed chunk format: `nonce (12B) || ciphertext || tag (16B)`.
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
    key_id: String,
}

impl AesGcmEncryptor {
    pub fn new(key: &[u8; 32], key_id: impl Into<String>) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            key_id: key_id.into(),
        }
    }
}

impl CaptureEncryptor for AesGcmEncryptor {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, data)
            .map_err(|e| format!("AES-GCM encryption failed: {}", e))?;

        // aes-gcm appends the tag to the ciphertext; prepend the nonce.
        let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn key_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("keyId".to_string(), self.key_id.clone()),
            ("algorithm".to_string(), AES_256_GCM.to_string()),
        ])
    }

    fn algorithm(&self) -> &str {
        AES_256_GCM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::Nonce;

    const KEY: [u8; 32] = [7; 32];

    #[test]
    fn sealed_chunk_layout_and_decrypt() {
        let encryptor = AesGcmEncryptor::new(&KEY, "k1");
        let sealed = encryptor.encrypt(b"pcm bytes").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 9 + TAG_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&KEY));
        let (nonce, body) = sealed.split_at(NONCE_LEN);
        let plain = cipher.decrypt(Nonce::from_slice(nonce), body).unwrap();
        assert_eq!(plain, b"pcm bytes");
    }

    #[test]
    fn nonces_differ_per_chunk() {
        let encryptor = AesGcmEncryptor::new(&KEY, "k1");
        let a = encryptor.encrypt(b"same").unwrap();
        let b = encryptor.encrypt(b"same").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn key_metadata_carries_id() {
        let encryptor = AesGcmEncryptor::new(&KEY, "k1");
        assert_eq!(encryptor.key_metadata().get("keyId").map(String::as_str), Some("k1"));
        assert_eq!(encryptor.algorithm(), "AES-256-GCM");
    }
}
