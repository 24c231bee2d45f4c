//! Per-request state of one proxied WebSocket connection.
//!
//! A context is built from the events of one inbound request body, consumed
//! by the application, and turned into the outbound events of the response.
//! It is not shared across threads; one request cycle owns it.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::codec::{decode_events, encode_events};
use super::control::control_message;
use super::event::{EventType, WebSocketEvent};
use crate::error::GripError;

const MESSAGE_PREFIX: &[u8] = b"m:";
const CONTROL_PREFIX: &[u8] = b"c:";

/// A message handed to the application by [`WebSocketContext::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct WebSocketContext {
    id: String,
    in_events: Vec<WebSocketEvent>,
    read_index: usize,
    meta: HashMap<String, String>,
    orig_meta: HashMap<String, String>,
    accepted: bool,
    closed: bool,
    close_code: Option<u16>,
    out_close_code: Option<u16>,
    out_events: Vec<WebSocketEvent>,
    prefix: String,
}

impl WebSocketContext {
    pub fn new(
        id: impl Into<String>,
        meta: HashMap<String, String>,
        in_events: Vec<WebSocketEvent>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            in_events,
            read_index: 0,
            orig_meta: meta.clone(),
            meta,
            accepted: false,
            closed: false,
            close_code: None,
            out_close_code: None,
            out_events: Vec::new(),
            prefix: prefix.into(),
        }
    }

    /// Decode a request body and build a context over its events.
    pub fn from_body(
        id: impl Into<String>,
        meta: HashMap<String, String>,
        body: &[u8],
        prefix: impl Into<String>,
    ) -> Result<Self, GripError> {
        let events = decode_events(body)?;
        Ok(Self::new(id, meta, events, prefix))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.meta
    }

    /// Metadata as it was when the context was created.
    pub fn original_meta(&self) -> &HashMap<String, String> {
        &self.orig_meta
    }

    pub fn is_opening(&self) -> bool {
        self.in_events
            .first()
            .is_some_and(|e| e.kind == EventType::Open)
    }

    /// Mark the connection accepted. The protocol layer reflects this in its
    /// response; nothing is appended to the outbound events.
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Request closing the connection. `None` records code 0.
    pub fn close(&mut self, code: Option<u16>) {
        self.closed = true;
        self.out_close_code = Some(code.unwrap_or(0));
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close code sent by the client, if a CLOSE with a 2-byte payload was received.
    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    /// Close code requested by the application via [`close`](Self::close).
    pub fn out_close_code(&self) -> Option<u16> {
        self.out_close_code
    }

    /// Whether a data-bearing event remains unread. Does not consume anything.
    pub fn can_receive(&self) -> bool {
        self.in_events[self.read_index..]
            .iter()
            .any(|e| e.kind.is_data_bearing())
    }

    /// Read the next data-bearing event.
    ///
    /// PINGs passed on the way are answered with a PONG carrying the same
    /// content. A CLOSE yields `Ok(None)`; a DISCONNECT yields
    /// [`GripError::Disconnected`]. With nothing left to read this fails with
    /// [`GripError::EmptyBuffer`], so guard with [`can_receive`](Self::can_receive).
    pub fn receive(&mut self) -> Result<Option<Message>, GripError> {
        let mut found = None;
        while self.read_index < self.in_events.len() {
            let event = &self.in_events[self.read_index];
            self.read_index += 1;
            if event.kind.is_data_bearing() {
                found = Some(event.clone());
                break;
            }
            if event.kind == EventType::Ping {
                self.out_events.push(WebSocketEvent {
                    kind: EventType::Pong,
                    content: event.content.clone(),
                });
            }
        }

        let event = found.ok_or(GripError::EmptyBuffer)?;
        match event.kind {
            EventType::Text => {
                let text = match event.content {
                    Some(content) => String::from_utf8(content)?,
                    None => String::new(),
                };
                Ok(Some(Message::Text(text)))
            }
            EventType::Binary => Ok(Some(Message::Binary(event.content.unwrap_or_default()))),
            EventType::Close => {
                if let Some(Ok(code)) = event.content.as_deref().map(<[u8; 2]>::try_from) {
                    self.close_code = Some(u16::from_be_bytes(code));
                }
                Ok(None)
            }
            _ => Err(GripError::Disconnected),
        }
    }

    pub fn send(&mut self, message: &str) {
        self.push_tagged(EventType::Text, MESSAGE_PREFIX, message.as_bytes());
    }

    pub fn send_binary(&mut self, message: &[u8]) {
        self.push_tagged(EventType::Binary, MESSAGE_PREFIX, message);
    }

    /// Send a control message (usually JSON from [`control_message`]) to the proxy.
    pub fn send_control(&mut self, message: &str) {
        self.push_tagged(EventType::Text, CONTROL_PREFIX, message.as_bytes());
    }

    pub fn subscribe(&mut self, channel: &str) {
        let msg = control_message("subscribe", Some(&self.channel_args(channel)));
        self.send_control(&msg);
    }

    pub fn unsubscribe(&mut self, channel: &str) {
        let msg = control_message("unsubscribe", Some(&self.channel_args(channel)));
        self.send_control(&msg);
    }

    /// Ask the proxy to stop brokering this connection without closing it.
    pub fn detach(&mut self) {
        self.send_control(&control_message("detach", None));
    }

    pub fn out_events(&self) -> &[WebSocketEvent] {
        &self.out_events
    }

    /// Outbound events in wire form, for the response body.
    pub fn encode_out_events(&self) -> Vec<u8> {
        encode_events(&self.out_events)
    }

    fn channel_args(&self, channel: &str) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert(
            "channel".to_string(),
            Value::String(format!("{}{}", self.prefix, channel)),
        );
        args
    }

    fn push_tagged(&mut self, kind: EventType, tag: &[u8], message: &[u8]) {
        let mut content = Vec::with_capacity(tag.len() + message.len());
        content.extend_from_slice(tag);
        content.extend_from_slice(message);
        self.out_events.push(WebSocketEvent::with_content(kind, content));
    }
}
