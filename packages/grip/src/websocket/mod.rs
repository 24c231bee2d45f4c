//! WebSocket-over-HTTP: event types, the body codec, control messages, and the
//! per-request connection context.

mod codec;
mod context;
mod control;
mod event;

pub use codec::{decode_events, encode_events};
pub use context::{Message, WebSocketContext};
pub use control::control_message;
pub use event::{EventType, UnknownType, WebSocketEvent};
