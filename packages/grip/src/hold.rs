//! Hold instructions and channel headers returned to the proxy in HTTP responses.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::encoding::TextOrBinary;
use crate::error::GripError;
use crate::format::headers_json;

/// A proxy channel, optionally carrying the id of the last message the client saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub prev_id: Option<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prev_id: None,
        }
    }

    pub fn with_prev_id(mut self, prev_id: impl Into<String>) -> Self {
        self.prev_id = Some(prev_id.into());
        self
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The response the proxy sends if a hold times out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub code: Option<u16>,
    pub reason: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl From<&str> for Response {
    fn from(body: &str) -> Self {
        Self {
            body: Some(body.as_bytes().to_vec()),
            ..Default::default()
        }
    }
}

impl Response {
    fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(code) = self.code {
            out.insert("code".into(), code.into());
        }
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.is_empty()) {
            out.insert("reason".into(), reason.into());
        }
        if !self.headers.is_empty() {
            out.insert("headers".into(), headers_json(&self.headers));
        }
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            TextOrBinary::classify(body).insert_into(&mut out, "body");
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldMode {
    /// Long-polling: one published message completes the request.
    Response,
    /// Streaming: published messages are appended to an open response.
    Stream,
}

impl HoldMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Stream => "stream",
        }
    }
}

/// Build the JSON hold instruction for `channels`.
pub fn create_hold(
    mode: HoldMode,
    channels: &[Channel],
    response: Option<&Response>,
    timeout: Option<u32>,
) -> Result<String, GripError> {
    if channels.is_empty() {
        return Err(GripError::NoChannels);
    }

    let mut hold = Map::new();
    hold.insert("mode".into(), mode.as_str().into());
    let ichannels: Vec<Value> = channels
        .iter()
        .map(|c| {
            let mut ichannel = Map::new();
            ichannel.insert("name".into(), c.name.clone().into());
            if let Some(prev_id) = c.prev_id.as_deref().filter(|s| !s.is_empty()) {
                ichannel.insert("prev-id".into(), prev_id.into());
            }
            Value::Object(ichannel)
        })
        .collect();
    hold.insert("channels".into(), ichannels.into());
    if let Some(timeout) = timeout.filter(|t| *t > 0) {
        hold.insert("timeout".into(), timeout.into());
    }

    let mut instruct = Map::new();
    instruct.insert("hold".into(), Value::Object(hold));
    if let Some(iresponse) = response.map(Response::to_json).filter(|r| !r.is_empty()) {
        instruct.insert("response".into(), Value::Object(iresponse));
    }

    Ok(Value::Object(instruct).to_string())
}

pub fn create_hold_response(
    channels: &[Channel],
    response: Option<&Response>,
    timeout: Option<u32>,
) -> Result<String, GripError> {
    create_hold(HoldMode::Response, channels, response, timeout)
}

pub fn create_hold_stream(
    channels: &[Channel],
    response: Option<&Response>,
) -> Result<String, GripError> {
    create_hold(HoldMode::Stream, channels, response, None)
}

/// `Grip-Channel` header value: `name[; prev-id=ID], ...`.
pub fn create_grip_channel_header(channels: &[Channel]) -> String {
    channels
        .iter()
        .map(|c| match &c.prev_id {
            Some(prev_id) => format!("{}; prev-id={}", c.name, prev_id),
            None => c.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
