// PayLink Core — message envelopes between a POS and a payment terminal
//
// Every message travels either plain (pairing only) or inside an
// encrypted, HMAC-signed envelope. This crate owns that envelope: shape
// selection, verify-then-decrypt, clock-adjusted stamping, and generic
// success/error extraction. Transport and pairing live elsewhere.

pub mod clock;
pub mod crypto;
pub mod message;
pub mod terminal;

pub use clock::{Clock, FixedClock, SystemClock};
pub use crypto::{CryptoError, MessageCrypto, MessageStamp, Secrets, StandardCrypto};
pub use message::{
    DecodeError, Envelope, EnvelopeCodec, Event, Message, MessageError, SuccessState, NO_ERROR,
};
pub use terminal::{request_id, TerminalBattery, TerminalStatusRequest, TerminalStatusResponse};
