// Event catalog — the fixed names that tag every message on the wire

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Protocol event names exchanged between the POS and the terminal.
///
/// The wire string is the only cross-process contract for dispatch, so
/// variants map one-to-one onto fixed strings. Names the catalog does not
/// know are kept as `Other` instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    PairRequest,
    KeyRequest,
    KeyResponse,
    KeyCheck,
    PairResponse,

    LoginRequest,
    LoginResponse,

    Ping,
    Pong,

    PurchaseRequest,
    PurchaseResponse,
    CancelTransactionRequest,
    GetLastTransactionRequest,
    GetLastTransactionResponse,
    RefundRequest,
    RefundResponse,
    SignatureRequired,
    SignatureDeclined,
    SignatureAccepted,

    SettleRequest,
    SettleResponse,

    KeyRollRequest,
    KeyRollResponse,

    TerminalStatusRequest,
    TerminalStatusResponse,
    BatteryLevelChanged,

    Error,

    /// Sentinel: the `hmac` of an encrypted envelope did not verify
    InvalidHmacSignature,
    /// Sentinel: outer or decrypted inner text was not a usable message
    Unparseable,

    /// A wire name outside this catalog
    Other(String),
}

const CATALOG: &[(Event, &str)] = &[
    (Event::PairRequest, "pair_request"),
    (Event::KeyRequest, "key_request"),
    (Event::KeyResponse, "key_response"),
    (Event::KeyCheck, "key_check"),
    (Event::PairResponse, "pair_response"),
    (Event::LoginRequest, "login_request"),
    (Event::LoginResponse, "login_response"),
    (Event::Ping, "ping"),
    (Event::Pong, "pong"),
    (Event::PurchaseRequest, "purchase"),
    (Event::PurchaseResponse, "purchase_response"),
    (Event::CancelTransactionRequest, "cancel_transaction"),
    (Event::GetLastTransactionRequest, "get_last_transaction"),
    (Event::GetLastTransactionResponse, "last_transaction"),
    (Event::RefundRequest, "refund"),
    (Event::RefundResponse, "refund_response"),
    (Event::SignatureRequired, "signature_required"),
    (Event::SignatureDeclined, "signature_decline"),
    (Event::SignatureAccepted, "signature_accept"),
    (Event::SettleRequest, "settle"),
    (Event::SettleResponse, "settle_response"),
    (Event::KeyRollRequest, "request_use_next_keys"),
    (Event::KeyRollResponse, "response_use_next_keys"),
    (Event::TerminalStatusRequest, "get_terminal_status"),
    (Event::TerminalStatusResponse, "terminal_status"),
    (Event::BatteryLevelChanged, "battery_level_changed"),
    (Event::Error, "error"),
    (Event::InvalidHmacSignature, "_INVALID_SIGNATURE_"),
    (Event::Unparseable, "unparseable"),
];

impl Event {
    /// Wire name of this event
    pub fn as_str(&self) -> &str {
        if let Event::Other(name) = self {
            return name;
        }
        CATALOG
            .iter()
            .find(|(event, _)| event == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    /// Resolve a wire name. Never fails: unknown names become `Other`.
    pub fn from_wire(name: &str) -> Self {
        CATALOG
            .iter()
            .find(|(_, wire)| *wire == name)
            .map(|(event, _)| event.clone())
            .unwrap_or_else(|| Event::Other(name.to_string()))
    }

    /// True for the two events decode synthesizes on failure
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Event::InvalidHmacSignature | Event::Unparseable)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Event::from_wire(s))
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Event::from_wire(&name))
    }
}
