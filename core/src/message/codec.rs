// Message codec — turns messages into wire JSON and back
//
// Inbound order for encrypted envelopes is fixed: verify the HMAC over the
// `enc` text first, and only decrypt once it matches.

use super::envelope::{DecodeError, Envelope};
use super::types::Message;
use crate::clock::{format_timestamp, Clock, SystemClock};
use crate::crypto::{CryptoError, MessageCrypto, MessageStamp, Secrets, StandardCrypto};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Stateless encoder/decoder for message envelopes.
///
/// Holds only the injected crypto provider and clock, so one codec can be
/// cloned or shared across threads freely.
#[derive(Clone)]
pub struct EnvelopeCodec {
    crypto: Arc<dyn MessageCrypto>,
    clock: Arc<dyn Clock>,
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(Arc::new(StandardCrypto::new()))
    }
}

impl EnvelopeCodec {
    pub fn new(crypto: Arc<dyn MessageCrypto>) -> Self {
        Self {
            crypto,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock used to stamp outgoing messages
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Serialize `message` for the wire.
    ///
    /// Stamps the message with the peer-adjusted time and the stamp's
    /// sender id before building the envelope. Fails only if the crypto
    /// provider does.
    pub fn encode(&self, message: &mut Message, stamp: &MessageStamp) -> Result<String, CryptoError> {
        let adjusted = self
            .clock
            .now_millis()
            .saturating_add(stamp.server_time_delta);
        message.date_time_stamp = format_timestamp(adjusted);
        message.sender_id = stamp.sender_id.clone();

        let mut inner = message.to_wire();

        if !message.needs_encryption() {
            // Plain messages carry the sender inside the message object
            inner.sender_id = Some(stamp.sender_id.clone());
            let json = Envelope::Plain { message: inner }.to_json();
            message.decrypted_json = json.clone();
            debug!("Encoded plain {} message {}", message.event, message.id);
            return Ok(json);
        }

        let plaintext = Envelope::Plain { message: inner }.to_json();
        message.decrypted_json = plaintext.clone();

        let enc = self.crypto.encrypt(stamp.secrets.enc_key(), &plaintext)?;
        let hmac = self
            .crypto
            .hmac_signature(stamp.secrets.hmac_key(), &enc)?
            .to_ascii_uppercase();

        debug!("Encoded encrypted {} message {}", message.event, message.id);

        Ok(Envelope::Encrypted {
            enc,
            hmac,
            sender_id: stamp.sender_id.clone(),
        }
        .to_json())
    }

    /// Decode wire text, reporting every failure as a [`DecodeError`].
    pub fn open(&self, text: &str, secrets: &Secrets) -> Result<Message, DecodeError> {
        match Envelope::parse(text)? {
            Envelope::Plain { message } => {
                debug!("Decoded plain {} message {}", message.event, message.id);
                let mut decoded = Message::from_wire(message, None, false);
                decoded.decrypted_json = text.to_string();
                Ok(decoded)
            }
            Envelope::Encrypted {
                enc,
                hmac,
                sender_id,
            } => {
                if !self.verify(&enc, &hmac, secrets)? {
                    warn!("Rejected envelope from {:?}: HMAC signature mismatch", sender_id);
                    return Err(DecodeError::InvalidSignature);
                }

                let plaintext = self.crypto.decrypt(secrets.enc_key(), &enc)?;
                let inner = Envelope::parse_inner(&plaintext)?;
                debug!("Decoded encrypted {} message {}", inner.event, inner.id);

                let mut decoded = Message::from_wire(inner, Some(sender_id), true);
                decoded.incoming_hmac = hmac;
                decoded.decrypted_json = plaintext;
                Ok(decoded)
            }
        }
    }

    /// Decode wire text without failing on bad input.
    ///
    /// Unparseable text and signature mismatches come back as sentinel
    /// messages so a dispatch loop can log them and move on. Only crypto
    /// provider faults are returned as errors.
    pub fn decode(&self, text: &str, secrets: &Secrets) -> Result<Message, CryptoError> {
        self.open(text, secrets).or_else(DecodeError::into_sentinel)
    }

    /// Check `hmac` against a fresh signature of `enc`, ignoring hex case.
    pub fn verify(&self, enc: &str, hmac: &str, secrets: &Secrets) -> Result<bool, CryptoError> {
        let expected = self
            .crypto
            .hmac_signature(secrets.hmac_key(), enc)?
            .to_ascii_uppercase();
        let claimed = hmac.to_ascii_uppercase();
        Ok(bool::from(expected.as_bytes().ct_eq(claimed.as_bytes())))
    }
}

impl DecodeError {
    /// Map a decode failure onto the sentinel message that represents it.
    /// Crypto faults have no sentinel and are handed back.
    pub fn into_sentinel(self) -> Result<Message, CryptoError> {
        match self {
            DecodeError::UnparseableOuter { raw } => {
                warn!("Unparseable envelope ({} bytes)", raw.len());
                Ok(Message::unparseable(raw))
            }
            DecodeError::UnparseableInner { raw } => {
                warn!("Unparseable decrypted payload ({} bytes)", raw.len());
                Ok(Message::unparseable(raw))
            }
            DecodeError::InvalidSignature => Ok(Message::invalid_signature()),
            DecodeError::Crypto(e) => Err(e),
        }
    }
}
