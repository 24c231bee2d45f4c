//! GRIP proxy helpers for applications sitting behind a realtime proxy.
//!
//! Two halves:
//!
//! - **WebSocket-over-HTTP**: [`websocket::decode_events`] / [`websocket::encode_events`]
//!   translate request and response bodies, and [`WebSocketContext`] drives one
//!   request cycle of a proxied connection (receive, send, subscribe, close).
//! - **Publishing**: [`Publisher`] hands [`Item`]s to a background worker that
//!   batches them per destination and POSTs them to the proxy's control endpoint.
//!
//! # Example
//!
//! ```no_run
//! use grip::{WebSocketContext, websocket::Message};
//!
//! # fn handle(body: &[u8]) -> Result<Vec<u8>, grip::GripError> {
//! let mut ws = WebSocketContext::from_body("conn-1", Default::default(), body, "")?;
//! if ws.is_opening() {
//!     ws.accept();
//!     ws.subscribe("news");
//! }
//! while ws.can_receive() {
//!     match ws.receive()? {
//!         Some(Message::Text(text)) => ws.send(&text),
//!         Some(Message::Binary(bytes)) => ws.send_binary(&bytes),
//!         None => ws.close(None),
//!     }
//! }
//! Ok(ws.encode_out_events())
//! # }
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod format;
pub mod hold;
pub mod publish;
pub mod token;
pub mod websocket;

pub use config::{GripConfig, parse_grip_uri};
pub use error::{ConfigError, GripError, PublishError};
pub use format::{
    Content, Format, HttpResponseFormat, HttpStreamFormat, Item, ItemIds, WebSocketMessageFormat,
};
pub use hold::{Channel, HoldMode, Response, create_grip_channel_header, create_hold};
pub use publish::{FailureCounter, FailureSink, PublishRequest, Publisher};
pub use token::validate_sig;
pub use websocket::{EventType, WebSocketContext, WebSocketEvent};
