//! Body codec for the WebSocket-over-HTTP protocol.
//!
//! ```text
//! TYPE\r\n                       (no content)
//! TYPE SP HEXLEN\r\nCONTENT\r\n  (content present, HEXLEN may be 0)
//! ```
//!
//! Segments are concatenated with no separator.

use super::event::{EventType, WebSocketEvent};
use crate::error::GripError;

const CRLF: &[u8] = b"\r\n";

/// Decode a request body into its ordered events.
///
/// Any malformed segment fails the whole call; no partial result is returned.
pub fn decode_events(body: &[u8]) -> Result<Vec<WebSocketEvent>, GripError> {
    let mut out = Vec::new();
    let mut start = 0;

    while start < body.len() {
        let at = find_crlf(&body[start..])
            .ok_or_else(|| bad_format(start, "missing line terminator"))?;
        let line = &body[start..start + at];
        let line_start = start;
        start += at + CRLF.len();

        let event = match line.iter().position(|&b| b == b' ') {
            Some(space) => {
                let kind = parse_type(&line[..space], line_start)?;
                let len = parse_hex_len(&line[space + 1..], line_start)?;

                let end = start
                    .checked_add(len)
                    .filter(|end| end.saturating_add(CRLF.len()) <= body.len())
                    .ok_or_else(|| bad_format(line_start, "content runs past end of body"))?;
                if &body[end..end + CRLF.len()] != CRLF {
                    return Err(bad_format(end, "content not followed by terminator"));
                }

                let content = body[start..end].to_vec();
                start = end + CRLF.len();
                WebSocketEvent::with_content(kind, content)
            }
            None => WebSocketEvent::new(parse_type(line, line_start)?),
        };
        out.push(event);
    }

    Ok(out)
}

/// Encode events into a response body. Never fails.
///
/// Lengths are written in lowercase hex without leading zeros, so a body that
/// used uppercase or zero-padded lengths decodes to the same events but does
/// not re-encode byte for byte.
pub fn encode_events(events: &[WebSocketEvent]) -> Vec<u8> {
    let mut out = Vec::new();

    for event in events {
        out.extend_from_slice(event.kind.as_str().as_bytes());
        match &event.content {
            Some(content) => {
                out.extend_from_slice(format!(" {:x}", content.len()).as_bytes());
                out.extend_from_slice(CRLF);
                out.extend_from_slice(content);
                out.extend_from_slice(CRLF);
            }
            None => out.extend_from_slice(CRLF),
        }
    }

    out
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(CRLF.len()).position(|w| w == CRLF)
}

fn parse_type(raw: &[u8], offset: usize) -> Result<EventType, GripError> {
    if raw.is_empty() {
        return Err(bad_format(offset, "empty event type"));
    }
    let name =
        std::str::from_utf8(raw).map_err(|_| bad_format(offset, "event type is not utf-8"))?;
    EventType::from_name(name).map_err(|_| bad_format(offset, "invalid event type"))
}

fn parse_hex_len(raw: &[u8], offset: usize) -> Result<usize, GripError> {
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_hexdigit) {
        return Err(bad_format(offset, "invalid content length"));
    }
    // all bytes are ascii hex digits, so this is valid utf-8
    let digits = std::str::from_utf8(raw).map_err(|_| bad_format(offset, "invalid content length"))?;
    usize::from_str_radix(digits, 16).map_err(|_| bad_format(offset, "content length overflows"))
}

fn bad_format(offset: usize, reason: &str) -> GripError {
    GripError::BadFormat(format!("{reason} at byte {offset}"))
}
