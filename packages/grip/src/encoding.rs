//! Shared encoding helpers: standard base64 and the text-or-binary split used
//! by exported JSON fields.

use data_encoding::BASE64;

/// Standard base64, padded.
pub fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard base64, padded.
pub fn base64_decode(s: &str) -> Result<Vec<u8>, data_encoding::DecodeError> {
    BASE64.decode(s.as_bytes())
}

/// A byte payload classified for JSON export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TextOrBinary {
    Text(String),
    /// Base64 of the original bytes.
    Binary(String),
}

impl TextOrBinary {
    pub(crate) fn classify(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Binary(base64_encode(bytes)),
        }
    }

    /// Insert as `field` (text) or `field-bin` (binary) into `out`.
    pub(crate) fn insert_into(
        self,
        out: &mut serde_json::Map<String, serde_json::Value>,
        field: &str,
    ) {
        match self {
            Self::Text(text) => {
                out.insert(field.to_string(), text.into());
            }
            Self::Binary(encoded) => {
                out.insert(format!("{field}-bin"), encoded.into());
            }
        }
    }
}
