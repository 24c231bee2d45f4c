use serde_json::{Map, Value};

/// Build a WebSocket control message: `args` plus a `type` field, as JSON text.
///
/// `args` is copied; a `type` key in it is overwritten.
pub fn control_message(kind: &str, args: Option<&Map<String, Value>>) -> String {
    let mut out = args.cloned().unwrap_or_default();
    out.insert("type".to_string(), Value::String(kind.to_string()));
    Value::Object(out).to_string()
}
