//! Publish formats and the [`Item`] that bundles them.
//!
//! A format is one representation of a published message, keyed by name in
//! the item's JSON (`http-response`, `http-stream`, `ws-message`). Subscribers
//! of each transport pick the representation meant for them.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::encoding::{TextOrBinary, base64_encode};

pub trait Format: fmt::Debug + Send + Sync {
    /// Key of this format inside an exported item.
    fn name(&self) -> &'static str;

    fn export(&self) -> Value;
}

/// Either plain text or a fully built format.
///
/// Text is converted into the format's primary field (body or content).
#[derive(Debug, Clone, PartialEq)]
pub enum Content<F> {
    Text(String),
    Format(F),
}

impl<F: From<String>> Content<F> {
    pub fn into_format(self) -> F {
        match self {
            Self::Text(text) => F::from(text),
            Self::Format(format) => format,
        }
    }
}

impl<F> From<&str> for Content<F> {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl<F> From<String> for Content<F> {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

// --- HttpResponseFormat ---

/// Delivered to clients held with a `response` hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponseFormat {
    pub code: Option<u16>,
    pub reason: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub content_filters: Option<Vec<String>>,
}

impl HttpResponseFormat {
    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            ..Default::default()
        }
    }
}

impl From<String> for HttpResponseFormat {
    fn from(body: String) -> Self {
        Self::with_body(body)
    }
}

impl From<HttpResponseFormat> for Content<HttpResponseFormat> {
    fn from(format: HttpResponseFormat) -> Self {
        Self::Format(format)
    }
}

impl Format for HttpResponseFormat {
    fn name(&self) -> &'static str {
        "http-response"
    }

    fn export(&self) -> Value {
        let mut out = Map::new();
        if let Some(filters) = &self.content_filters {
            out.insert("content-filters".into(), filters.clone().into());
        }
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
        Value::Object(out)
    }
}

// --- HttpStreamFormat ---

/// Delivered to clients held with a `stream` hold: a chunk of content, or an
/// instruction to close the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpStreamFormat {
    Content {
        content: Vec<u8>,
        content_filters: Option<Vec<String>>,
    },
    Close,
}

impl HttpStreamFormat {
    pub fn content(content: impl Into<Vec<u8>>) -> Self {
        Self::Content {
            content: content.into(),
            content_filters: None,
        }
    }
}

impl From<String> for HttpStreamFormat {
    fn from(content: String) -> Self {
        Self::content(content)
    }
}

impl From<HttpStreamFormat> for Content<HttpStreamFormat> {
    fn from(format: HttpStreamFormat) -> Self {
        Self::Format(format)
    }
}

impl Format for HttpStreamFormat {
    fn name(&self) -> &'static str {
        "http-stream"
    }

    fn export(&self) -> Value {
        let mut out = Map::new();
        match self {
            Self::Close => {
                out.insert("action".into(), "close".into());
            }
            Self::Content {
                content,
                content_filters,
            } => {
                if let Some(filters) = content_filters {
                    out.insert("content-filters".into(), filters.clone().into());
                }
                TextOrBinary::classify(content).insert_into(&mut out, "content");
            }
        }
        Value::Object(out)
    }
}

// --- WebSocketMessageFormat ---

/// Delivered to WebSocket clients subscribed through the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketMessageFormat {
    pub content: Vec<u8>,
    pub binary: bool,
}

impl WebSocketMessageFormat {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into().into_bytes(),
            binary: false,
        }
    }

    pub fn binary(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            binary: true,
        }
    }
}

impl From<String> for WebSocketMessageFormat {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

impl From<WebSocketMessageFormat> for Content<WebSocketMessageFormat> {
    fn from(format: WebSocketMessageFormat) -> Self {
        Self::Format(format)
    }
}

impl Format for WebSocketMessageFormat {
    fn name(&self) -> &'static str {
        "ws-message"
    }

    fn export(&self) -> Value {
        let mut out = Map::new();
        if self.binary {
            out.insert("content-bin".into(), base64_encode(&self.content).into());
        } else {
            // text that is not valid utf-8 still goes out intact, as content-bin
            TextOrBinary::classify(&self.content).insert_into(&mut out, "content");
        }
        Value::Object(out)
    }
}

// --- Item ---

/// Optional `id` / `prev-id` pair for the publish entry points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIds {
    pub id: Option<String>,
    pub prev_id: Option<String>,
}

impl ItemIds {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            prev_id: None,
        }
    }

    pub fn with_prev_id(mut self, prev_id: impl Into<String>) -> Self {
        self.prev_id = Some(prev_id.into());
        self
    }
}

/// A published message: one or more formats plus optional ids used by the
/// proxy to detect gaps (`prev-id`).
#[derive(Debug, Default)]
pub struct Item {
    pub id: Option<String>,
    pub prev_id: Option<String>,
    formats: Vec<Box<dyn Format>>,
}

impl Item {
    pub fn new(format: impl Format + 'static) -> Self {
        Self {
            formats: vec![Box::new(format)],
            ..Default::default()
        }
    }

    /// One-format item from text or a built format.
    pub fn from_content<F>(content: impl Into<Content<F>>) -> Self
    where
        F: Format + From<String> + 'static,
    {
        Self::new(content.into().into_format())
    }

    pub fn with_ids(mut self, ids: ItemIds) -> Self {
        self.id = ids.id;
        self.prev_id = ids.prev_id;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_prev_id(mut self, prev_id: impl Into<String>) -> Self {
        self.prev_id = Some(prev_id.into());
        self
    }

    pub fn add_format(mut self, format: impl Format + 'static) -> Self {
        self.formats.push(Box::new(format));
        self
    }

    pub fn formats(&self) -> &[Box<dyn Format>] {
        &self.formats
    }

    pub fn export(&self) -> Value {
        let mut out = Map::new();
        if let Some(id) = self.id.as_deref().filter(|s| !s.is_empty()) {
            out.insert("id".into(), id.into());
        }
        if let Some(prev_id) = self.prev_id.as_deref().filter(|s| !s.is_empty()) {
            out.insert("prev-id".into(), prev_id.into());
        }
        for format in &self.formats {
            out.insert(format.name().into(), format.export());
        }
        Value::Object(out)
    }
}

pub(crate) fn headers_json(headers: &BTreeMap<String, String>) -> Value {
    headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect::<Map<_, _>>()
        .into()
}
