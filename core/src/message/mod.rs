// Message module — events, the message model and the envelope codec

pub mod codec;
pub mod envelope;
pub mod event;
pub mod types;

pub use codec::EnvelopeCodec;
pub use envelope::{DecodeError, Envelope, WireMessage};
pub use event::Event;
pub use types::{Message, MessageError, SuccessState, NO_ERROR};
