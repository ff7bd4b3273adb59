// Cryptography module — the capability the envelope codec consumes, plus
// the session secrets and outbound stamp that feed it

pub mod provider;
pub mod secrets;

pub use provider::{MessageCrypto, StandardCrypto, KEY_LEN, NONCE_LEN};
pub use secrets::{MessageStamp, Secrets};

#[cfg(test)]
pub use provider::MockMessageCrypto;

use thiserror::Error;

/// Failures raised by a crypto capability.
///
/// These point at a key or configuration problem rather than a malformed
/// wire message, so the codec propagates them instead of folding them into
/// a sentinel message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Decrypted payload is not UTF-8")]
    InvalidPlaintext,
}
