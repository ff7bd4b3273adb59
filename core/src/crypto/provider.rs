// Crypto capability: HMAC signatures plus symmetric encrypt/decrypt
//
// Default provider:
// 1. HMAC-SHA256(hmac_key, enc_text) → lower-case hex
// 2. XChaCha20-Poly1305(enc_key, random 24-byte nonce, plaintext)
// 3. Wire text: upper-case hex of nonce || ciphertext

use super::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Symmetric key length required by `StandardCrypto::encrypt`
pub const KEY_LEN: usize = 32;

/// XChaCha20 nonce length, prefixed to every ciphertext
pub const NONCE_LEN: usize = 24;

/// The primitives the envelope codec needs.
///
/// Implementations must be deterministic for `hmac_signature` and satisfy
/// `decrypt(k, encrypt(k, x)) == x`. They are shared across threads, so
/// they must be safe for concurrent use.
#[cfg_attr(test, mockall::automock)]
pub trait MessageCrypto: Send + Sync {
    /// Hex-encoded signature of `data` under `key`. Case is not significant.
    fn hmac_signature(&self, key: &[u8], data: &str) -> Result<String, CryptoError>;

    /// Encrypt `plaintext`, returning text safe to embed in a JSON string.
    fn encrypt(&self, key: &[u8], plaintext: &str) -> Result<String, CryptoError>;

    /// Reverse of `encrypt`.
    fn decrypt(&self, key: &[u8], ciphertext: &str) -> Result<String, CryptoError>;
}

/// HMAC-SHA256 signatures with XChaCha20-Poly1305 encryption.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCrypto;

impl StandardCrypto {
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &[u8]) -> Result<XChaCha20Poly1305, CryptoError> {
        XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: key.len(),
        })
    }
}

impl MessageCrypto for StandardCrypto {
    fn hmac_signature(&self, key: &[u8], data: &str) -> Result<String, CryptoError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn encrypt(&self, key: &[u8], plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Self::cipher(key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut wire = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&ciphertext);

        Ok(hex::encode_upper(wire))
    }

    fn decrypt(&self, key: &[u8], ciphertext: &str) -> Result<String, CryptoError> {
        let cipher = Self::cipher(key)?;

        let wire = hex::decode(ciphertext)
            .map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?;
        if wire.len() < NONCE_LEN {
            return Err(CryptoError::InvalidCiphertext(format!(
                "{} bytes is shorter than the nonce",
                wire.len()
            )));
        }

        let (nonce_bytes, body) = wire.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce_bytes), body)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|e| {
            e.into_bytes().zeroize();
            CryptoError::InvalidPlaintext
        })
    }
}
