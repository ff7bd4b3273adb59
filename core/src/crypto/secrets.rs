// Session secrets and the outbound stamp

use super::{CryptoError, KEY_LEN};
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The key pair agreed during pairing: one key encrypts, the other signs.
///
/// Key bytes are wiped when the value is dropped and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secrets {
    enc_key: Vec<u8>,
    hmac_key: Vec<u8>,
}

impl Secrets {
    pub fn new(enc_key: Vec<u8>, hmac_key: Vec<u8>) -> Self {
        Self { enc_key, hmac_key }
    }

    /// Build from hex strings (either case).
    pub fn from_hex(enc_key_hex: &str, hmac_key_hex: &str) -> Result<Self, CryptoError> {
        let enc_key = hex::decode(enc_key_hex.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("enc_key: {}", e)))?;
        let hmac_key = hex::decode(hmac_key_hex.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("hmac_key: {}", e)))?;
        Ok(Self { enc_key, hmac_key })
    }

    /// Fresh random keys, for tests and local tooling. Real sessions get
    /// their keys from pairing.
    pub fn generate() -> Self {
        let mut enc_key = vec![0u8; KEY_LEN];
        let mut hmac_key = vec![0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut enc_key);
        rand::rngs::OsRng.fill_bytes(&mut hmac_key);
        Self { enc_key, hmac_key }
    }

    pub fn enc_key(&self) -> &[u8] {
        &self.enc_key
    }

    pub fn hmac_key(&self) -> &[u8] {
        &self.hmac_key
    }

    /// Upper-case hex of (enc_key, hmac_key)
    pub fn to_hex(&self) -> (String, String) {
        (
            hex::encode_upper(&self.enc_key),
            hex::encode_upper(&self.hmac_key),
        )
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("enc_key", &"<redacted>")
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}

/// Everything needed to turn an outgoing message into wire JSON.
///
/// Built once per session and shared by reference; the codec never
/// mutates it.
#[derive(Debug, Clone)]
pub struct MessageStamp {
    /// Identity written into `senderId`
    pub sender_id: String,
    pub secrets: Secrets,
    /// Milliseconds added to local time so stamps agree with the peer
    pub server_time_delta: i64,
}

impl MessageStamp {
    pub fn new(sender_id: impl Into<String>, secrets: Secrets, server_time_delta: i64) -> Self {
        Self {
            sender_id: sender_id.into(),
            secrets,
            server_time_delta,
        }
    }
}
