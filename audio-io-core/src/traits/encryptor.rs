use std::collections::HashMap;

/// Chunk encryption for recorded audio.
///
/// Sealed chunk format:
/// ```text
/// [12-byte nonce] [ciphertext] [16-byte GCM authentication tag]
/// ```
pub trait CaptureEncryptor: Send + Sync {
    /// Returns `nonce || ciphertext || tag`.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String>;

    /// Key id and similar non-secret metadata.
    fn key_metadata(&self) -> HashMap<String, String>;

    /// Algorithm identifier (e.g., "AES-256-GCM").
    fn algorithm(&self) -> &str;
}
