// Message types — one protocol message plus generic status extraction

use super::envelope::WireMessage;
use super::event::Event;
use crate::clock::{parse_timestamp, Clock};
use serde_json::{json, Value};
use thiserror::Error;

/// Error text reported when a response carries no `error_reason`
pub const NO_ERROR: &str = "NONE";

/// Outcome reported by a response's `success` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessState {
    /// No `success` field (or no data at all)
    Unknown,
    Success,
    Failed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Message has no data")]
    MissingData,
}

/// A protocol message, either built locally for sending or produced by
/// decoding wire JSON.
///
/// Whether an outgoing message is encrypted is fixed when it is created.
/// `date_time_stamp` and `sender_id` stay empty until the message is
/// encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub event: Event,
    /// Arbitrary payload; `Value::Null` means the message has no data
    pub data: Value,
    /// `yyyy-MM-ddTHH:mm:ss.fff`, no zone suffix
    pub date_time_stamp: String,
    pub sender_id: String,
    /// Outer `hmac` of an encrypted inbound message, empty otherwise.
    /// Key-check flows need it.
    pub incoming_hmac: String,
    /// Plaintext JSON this message was read from or written as. Diagnostics only.
    pub decrypted_json: String,
    needs_encryption: bool,
}

impl Message {
    pub fn new(id: impl Into<String>, event: Event, data: Value, needs_encryption: bool) -> Self {
        Self {
            id: id.into(),
            event,
            data,
            date_time_stamp: String::new(),
            sender_id: String::new(),
            incoming_hmac: String::new(),
            decrypted_json: String::new(),
            needs_encryption,
        }
    }

    /// Sentinel for an encrypted envelope whose signature did not verify
    pub fn invalid_signature() -> Self {
        Self::new("_", Event::InvalidHmacSignature, Value::Null, false)
    }

    /// Sentinel for text that could not be read as a message. The raw text
    /// is kept under `data.msg` for logging.
    pub fn unparseable(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut message = Self::new("Unknown", Event::Unparseable, json!({ "msg": raw }), false);
        message.decrypted_json = raw;
        message
    }

    pub(crate) fn from_wire(
        wire: WireMessage,
        envelope_sender: Option<String>,
        needs_encryption: bool,
    ) -> Self {
        let sender_id = wire
            .sender()
            .map(str::to_string)
            .or(envelope_sender)
            .unwrap_or_default();

        Self {
            id: wire.id,
            event: wire.event,
            data: wire.data,
            date_time_stamp: wire.datetime,
            sender_id,
            incoming_hmac: String::new(),
            decrypted_json: String::new(),
            needs_encryption,
        }
    }

    /// Inner wire object without `senderId`
    pub(crate) fn to_wire(&self) -> WireMessage {
        WireMessage {
            id: self.id.clone(),
            event: self.event.clone(),
            data: self.data.clone(),
            datetime: self.date_time_stamp.clone(),
            sender_id: None,
            pos_id: None,
        }
    }

    pub fn needs_encryption(&self) -> bool {
        self.needs_encryption
    }

    /// True for messages synthesized by a failed decode
    pub fn is_sentinel(&self) -> bool {
        self.event.is_sentinel()
    }

    /// Read `data.success`. Absent field or absent data is `Unknown`.
    pub fn success_state(&self) -> SuccessState {
        match self.data.get("success") {
            None => SuccessState::Unknown,
            Some(flag) if is_truthy(flag) => SuccessState::Success,
            Some(_) => SuccessState::Failed,
        }
    }

    /// `data.error_reason`, or [`NO_ERROR`] when it is absent or empty.
    ///
    /// Check `success_state()` first; a message without data has no error
    /// to report.
    pub fn error(&self) -> Result<String, MessageError> {
        if self.data.is_null() {
            return Err(MessageError::MissingData);
        }

        Ok(match self.data.get("error_reason") {
            Some(Value::String(reason)) if !reason.is_empty() => reason.clone(),
            Some(other) if is_truthy(other) => other.to_string(),
            _ => NO_ERROR.to_string(),
        })
    }

    /// Milliseconds between this message's stamped time and `clock`.
    ///
    /// Positive when the peer's clock is ahead of ours. `None` when the
    /// stamp cannot be parsed.
    pub fn try_server_time_delta(&self, clock: &dyn Clock) -> Option<i64> {
        parse_timestamp(&self.date_time_stamp).map(|stamped| stamped - clock.now_millis())
    }

    /// Best-effort version of [`Message::try_server_time_delta`]: an
    /// unparsable stamp yields `0`, i.e. no correction.
    pub fn server_time_delta(&self, clock: &dyn Clock) -> i64 {
        self.try_server_time_delta(clock).unwrap_or_else(|| {
            tracing::debug!(
                "Unparsable datetime {:?} on message {}, assuming no clock skew",
                self.date_time_stamp,
                self.id
            );
            0
        })
    }
}

/// JSON truthiness: `false`, `null`, `0` and `""` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
