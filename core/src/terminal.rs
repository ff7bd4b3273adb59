// Terminal status — typed wrappers over the status request/response pair

use crate::message::{Event, Message};
use serde_json::{json, Value};

/// Build a request id: the prefix followed by a random suffix.
pub fn request_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &suffix[..12])
}

/// Asks the terminal for its status and battery state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalStatusRequest;

impl TerminalStatusRequest {
    pub fn to_message(&self) -> Message {
        Message::new(
            request_id("trmnl"),
            Event::TerminalStatusRequest,
            json!({}),
            true,
        )
    }
}

/// Read-only view of a `terminal_status` response.
#[derive(Debug, Clone)]
pub struct TerminalStatusResponse {
    message: Message,
}

impl TerminalStatusResponse {
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn status(&self) -> Option<&str> {
        self.message.data.get("status").and_then(Value::as_str)
    }

    /// Battery percentage. Terminals send either a number or a string.
    pub fn battery_level(&self) -> Option<i64> {
        self.message.data.get("battery_level").and_then(parse_level)
    }

    pub fn is_charging(&self) -> bool {
        match self.message.data.get("charging") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::Array(_) | Value::Object(_)) => true,
            Some(Value::Null) | None => false,
        }
    }
}

/// Unsolicited battery report (`battery_level_changed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalBattery {
    pub battery_level: Option<i64>,
}

impl TerminalBattery {
    pub fn from_message(message: &Message) -> Self {
        Self {
            battery_level: message.data.get("battery_level").and_then(parse_level),
        }
    }
}

/// Base-10 integer from a JSON number or the leading digits of a string
/// (`"85%"` reads as 85).
fn parse_level(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim_start();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|level| sign * level)
        }
        _ => None,
    }
}
