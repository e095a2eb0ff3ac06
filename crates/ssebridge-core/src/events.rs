//! Messages crossing the bridge.
//!
//! [`InboundEvent`]s arrive on the SSE stream and are rendered as exactly one
//! stdout line each. [`OutboundRequest`]s come from stdin (or the liveness
//! monitor) and become POST bodies.

use serde_json::{Value, json};
use uuid::Uuid;

use crate::handshake::HANDSHAKE_EVENT;

/// SSE event name used when the server sends no `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// Prefix of synthetic liveness ping ids.
pub const PING_ID_PREFIX: &str = "ssebridge-ping-";

/// One server push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    /// Event name; `message` for the default channel.
    pub event_name: String,
    /// Raw `data:` payload.
    pub payload: String,
}

impl InboundEvent {
    /// Build an event, treating an empty name as the default channel.
    pub fn new(event_name: impl Into<String>, payload: impl Into<String>) -> Self {
        let event_name = event_name.into();
        let event_name = if event_name.trim().is_empty() {
            DEFAULT_EVENT.to_owned()
        } else {
            event_name
        };
        Self {
            event_name,
            payload: payload.into(),
        }
    }

    /// Whether this is the unnamed `message` event.
    pub fn is_default(&self) -> bool {
        self.event_name == DEFAULT_EVENT
    }

    /// Whether this is the `endpoint` handshake event.
    pub fn is_handshake(&self) -> bool {
        self.event_name == HANDSHAKE_EVENT
    }

    /// Render as a single output line (no trailing newline).
    ///
    /// Default events pass the payload through; named events are wrapped as
    /// `{"event": <name>, "data": <payload>}` so consumers can tell them
    /// apart from protocol messages.
    pub fn to_output_line(&self) -> String {
        if self.is_default() {
            return single_line(&self.payload);
        }
        let data = serde_json::from_str::<Value>(&self.payload)
            .unwrap_or_else(|_| Value::String(self.payload.clone()));
        json!({ "event": self.event_name, "data": data }).to_string()
    }
}

/// Collapse a payload to one line.
///
/// Payloads without line breaks are returned verbatim. Multi-line JSON is
/// re-serialized compactly; anything else has its line breaks replaced by
/// single spaces.
pub fn single_line(payload: &str) -> String {
    if !payload.contains(['\n', '\r']) {
        return payload.to_owned();
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => value.to_string(),
        Err(_) => payload
            .split(['\n', '\r'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Where an outbound request came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A line read from stdin.
    Input,
    /// A synthetic ping from the liveness monitor.
    Liveness,
}

/// One message to POST to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    body: String,
    origin: Origin,
}

impl OutboundRequest {
    /// Build from a raw input line. Returns `None` for blank lines.
    pub fn from_input(raw_line: &str) -> Option<Self> {
        let body = raw_line.trim();
        (!body.is_empty()).then(|| Self {
            body: body.to_owned(),
            origin: Origin::Input,
        })
    }

    /// A synthetic JSON-RPC `ping` with a fresh, unique id.
    pub fn liveness_ping() -> Self {
        let id = format!("{PING_ID_PREFIX}{}", Uuid::now_v7());
        Self {
            body: json!({ "jsonrpc": "2.0", "id": id, "method": "ping" }).to_string(),
            origin: Origin::Liveness,
        }
    }

    /// The trimmed POST body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Where this request came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The JSON-RPC `id`, if the body is an object carrying a non-null one.
    pub fn request_id(&self) -> Option<Value> {
        let value: Value = serde_json::from_str(&self.body).ok()?;
        value
            .as_object()?
            .get("id")
            .filter(|id| !id.is_null())
            .cloned()
    }

    /// A JSON-RPC error reply for this request, for mirroring failures back
    /// to the client.
    ///
    /// Returns `None` for notifications (no `id`) and for synthetic pings,
    /// which the client never sent.
    pub fn error_reply(&self, code: i64, message: &str, kind: &str) -> Option<String> {
        if self.origin != Origin::Input {
            return None;
        }
        let id = self.request_id()?;
        Some(
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": code,
                    "message": message,
                    "data": { "kind": kind },
                },
            })
            .to_string(),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── InboundEvent ─────────────────────────────────────────────────────

    #[test]
    fn empty_name_is_default_channel() {
        let ev = InboundEvent::new("", "{}");
        assert_eq!(ev.event_name, "message");
        assert!(ev.is_default());
    }

    #[test]
    fn default_event_passes_payload_verbatim() {
        let payload = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let ev = InboundEvent::new("message", payload);
        assert_eq!(ev.to_output_line(), payload);
    }

    #[test]
    fn named_event_is_wrapped_with_parsed_json() {
        let ev = InboundEvent::new("progress", r#"{"pct":50}"#);
        let line: Value = serde_json::from_str(&ev.to_output_line()).unwrap();
        assert_eq!(line["event"], "progress");
        assert_eq!(line["data"]["pct"], 50);
    }

    #[test]
    fn named_event_with_text_payload_keeps_string() {
        let ev = InboundEvent::new("endpoint", "/messages/?session_id=abc");
        assert!(ev.is_handshake());
        let line: Value = serde_json::from_str(&ev.to_output_line()).unwrap();
        assert_eq!(line["event"], "endpoint");
        assert_eq!(line["data"], "/messages/?session_id=abc");
    }

    #[test]
    fn multiline_json_is_compacted() {
        let ev = InboundEvent::new("message", "{\n  \"a\": 1\n}");
        assert_eq!(ev.to_output_line(), r#"{"a":1}"#);
    }

    #[test]
    fn multiline_text_is_joined() {
        assert_eq!(single_line("one\r\ntwo\nthree"), "one two three");
    }

    // ── OutboundRequest ──────────────────────────────────────────────────

    #[test]
    fn input_line_is_trimmed() {
        let req = OutboundRequest::from_input("  {\"id\":1}\r\n").unwrap();
        assert_eq!(req.body(), "{\"id\":1}");
        assert_eq!(req.origin(), Origin::Input);
    }

    #[test]
    fn blank_input_is_ignored() {
        assert!(OutboundRequest::from_input("   \n").is_none());
    }

    #[test]
    fn liveness_pings_have_unique_ids() {
        let a = OutboundRequest::liveness_ping();
        let b = OutboundRequest::liveness_ping();
        assert_eq!(a.origin(), Origin::Liveness);
        let id_a = a.request_id().unwrap();
        let id_b = b.request_id().unwrap();
        assert_ne!(id_a, id_b);
        assert!(id_a.as_str().unwrap().starts_with(PING_ID_PREFIX));
        let body: Value = serde_json::from_str(a.body()).unwrap();
        assert_eq!(body["method"], "ping");
    }

    #[test]
    fn request_id_reads_numbers_and_strings() {
        let num = OutboundRequest::from_input(r#"{"id":7,"method":"x"}"#).unwrap();
        assert_eq!(num.request_id(), Some(json!(7)));
        let text = OutboundRequest::from_input(r#"{"id":"r1"}"#).unwrap();
        assert_eq!(text.request_id(), Some(json!("r1")));
        let notification = OutboundRequest::from_input(r#"{"method":"n"}"#).unwrap();
        assert_eq!(notification.request_id(), None);
        let null_id = OutboundRequest::from_input(r#"{"id":null}"#).unwrap();
        assert_eq!(null_id.request_id(), None);
    }

    #[test]
    fn error_reply_carries_id_code_and_kind() {
        let req = OutboundRequest::from_input(r#"{"jsonrpc":"2.0","id":3,"method":"m"}"#).unwrap();
        let reply: Value =
            serde_json::from_str(&req.error_reply(-32001, "gone", "endpoint_missing").unwrap())
                .unwrap();
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["error"]["code"], -32001);
        assert_eq!(reply["error"]["message"], "gone");
        assert_eq!(reply["error"]["data"]["kind"], "endpoint_missing");
    }

    #[test]
    fn error_reply_skips_notifications_and_pings() {
        let note = OutboundRequest::from_input(r#"{"method":"n"}"#).unwrap();
        assert!(note.error_reply(-1, "x", "k").is_none());
        let raw = OutboundRequest::from_input("plain text").unwrap();
        assert!(raw.error_reply(-1, "x", "k").is_none());
        assert!(OutboundRequest::liveness_ping().error_reply(-1, "x", "k").is_none());
    }
}
