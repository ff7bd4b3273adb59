// Envelope — the two wire shapes a message can travel in
//
// Plain:     {"message": {"id", "event", "data", "datetime", "senderId"}}
// Encrypted: {"enc": <ciphertext>, "hmac": <HEX>, "senderId": <id>}
//
// A non-null top-level "message" always means Plain; the other fields are
// not looked at in that case.

use super::event::Event;
use crate::crypto::CryptoError;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Wire name of the sender field
pub const SENDER_ID_FIELD: &str = "senderId";

/// Older peers name the sender field `pos_id`
pub const LEGACY_SENDER_ID_FIELD: &str = "pos_id";

/// Why an inbound payload could not be turned into a message.
///
/// The first three are properties of the wire data. `Crypto` means the
/// local keys or crypto provider are broken.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Envelope is not a parseable message")]
    UnparseableOuter { raw: String },

    #[error("HMAC signature does not match")]
    InvalidSignature,

    #[error("Decrypted payload is not a parseable message")]
    UnparseableInner { raw: String },

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The inner `message` object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default = "missing_event")]
    pub event: Event,
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub datetime: String,
    #[serde(default, rename = "senderId")]
    pub sender_id: Option<String>,
    #[serde(default, rename = "pos_id")]
    pub pos_id: Option<String>,
}

impl WireMessage {
    /// Sender named inside the message. `senderId` wins over `pos_id`.
    pub fn sender(&self) -> Option<&str> {
        [&self.sender_id, &self.pos_id]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|id| !id.is_empty())
    }

    /// JSON object in wire field order. `senderId` is written only when set.
    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::String(self.id.clone()));
        fields.insert("event".into(), Value::String(self.event.as_str().to_string()));
        fields.insert("data".into(), self.data.clone());
        fields.insert("datetime".into(), Value::String(self.datetime.clone()));
        if let Some(sender_id) = &self.sender_id {
            fields.insert(SENDER_ID_FIELD.into(), Value::String(sender_id.clone()));
        }
        Value::Object(fields)
    }
}

/// One wire envelope, resolved to exactly one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Plain {
        message: WireMessage,
    },
    Encrypted {
        enc: String,
        hmac: String,
        sender_id: String,
    },
}

#[derive(Deserialize)]
struct InnerEnvelope {
    message: WireMessage,
}

impl Envelope {
    /// Classify raw wire text.
    ///
    /// Missing or non-string `enc`/`hmac` fields are read as empty strings;
    /// such an envelope can never pass signature verification.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let unparseable = || DecodeError::UnparseableOuter {
            raw: text.to_string(),
        };

        let value: Value = serde_json::from_str(text).map_err(|_| unparseable())?;
        let Value::Object(mut fields) = value else {
            return Err(unparseable());
        };

        match fields.remove("message") {
            None | Some(Value::Null) => {}
            Some(message) => {
                let message = serde_json::from_value(message).map_err(|_| unparseable())?;
                return Ok(Envelope::Plain { message });
            }
        }

        let sender_id = string_field(&fields, SENDER_ID_FIELD)
            .or_else(|| string_field(&fields, LEGACY_SENDER_ID_FIELD))
            .unwrap_or_default();

        Ok(Envelope::Encrypted {
            enc: string_field(&fields, "enc").unwrap_or_default(),
            hmac: string_field(&fields, "hmac").unwrap_or_default(),
            sender_id,
        })
    }

    /// Read the decrypted plaintext of an encrypted envelope.
    pub fn parse_inner(plaintext: &str) -> Result<WireMessage, DecodeError> {
        serde_json::from_str::<InnerEnvelope>(plaintext)
            .map(|inner| inner.message)
            .map_err(|_| DecodeError::UnparseableInner {
                raw: plaintext.to_string(),
            })
    }

    /// Wire JSON text
    pub fn to_json(&self) -> String {
        let mut fields = Map::new();
        match self {
            Envelope::Plain { message } => {
                fields.insert("message".into(), message.to_value());
            }
            Envelope::Encrypted {
                enc,
                hmac,
                sender_id,
            } => {
                fields.insert("enc".into(), Value::String(enc.clone()));
                fields.insert("hmac".into(), Value::String(hmac.clone()));
                fields.insert(SENDER_ID_FIELD.into(), Value::String(sender_id.clone()));
            }
        }
        Value::Object(fields).to_string()
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Envelope::Encrypted { .. })
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

fn missing_event() -> Event {
    Event::Other(String::new())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
