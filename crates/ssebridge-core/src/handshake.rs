//! Session identifier extraction from the `endpoint` handshake event.
//!
//! Servers encode the handshake differently, so resolution is a best-effort
//! chain of pure strategies tried in order; the first one yielding a
//! non-empty identifier wins:
//!
//! 1. JSON object with a `session_id` field
//! 2. JSON object with a `url`, `endpoint` or `uri` field whose URL carries a
//!    `session_id` query parameter
//! 3. The raw payload parsed as a URL with a `session_id` query parameter
//! 4. A `session_id=<value>` substring, terminated by `&` or end of input
//!
//! Strategies 2 and 3 also accept server-relative URLs such as
//! `/messages/?session_id=abc`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::session::SessionId;

/// SSE event name carrying the handshake.
pub const HANDSHAKE_EVENT: &str = "endpoint";

/// Query parameter / JSON field holding the identifier.
const SESSION_ID_KEY: &str = "session_id";

/// JSON fields that may hold a URL carrying the identifier.
const URL_FIELDS: [&str; 3] = ["url", "endpoint", "uri"];

/// Origin used to resolve server-relative URLs. Only the query is read.
const PLACEHOLDER_ORIGIN: &str = "http://placeholder.invalid/";

static SESSION_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"session_id=([^&]*)").expect("static pattern is valid"));

/// A single extraction strategy.
pub type Strategy = fn(&str) -> Option<String>;

/// Named strategies in the order they are tried.
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("json_session_id", from_json_field),
    ("json_url_field", from_json_url_field),
    ("payload_url", from_payload_url),
    ("substring", from_substring),
];

/// Outcome of a successful resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// The extracted identifier.
    pub session_id: SessionId,
    /// Name of the strategy that produced it.
    pub strategy: &'static str,
}

/// Run the strategy chain over a handshake payload.
///
/// Returns `None` when every strategy fails.
pub fn resolve(payload: &str) -> Option<Resolved> {
    let payload = payload.trim();
    STRATEGIES.iter().find_map(|(name, strategy)| {
        strategy(payload)
            .filter(|id| !id.is_empty())
            .map(|id| Resolved {
                session_id: SessionId::new(id),
                strategy: *name,
            })
    })
}

/// Strategy 1: `{"session_id": "..."}`.
pub fn from_json_field(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    match value.as_object()?.get(SESSION_ID_KEY)? {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strategy 2: `{"url": "http://host/messages/?session_id=..."}` (or
/// `endpoint` / `uri`).
pub fn from_json_url_field(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    let object = value.as_object()?;
    URL_FIELDS
        .iter()
        .filter_map(|field| object.get(*field)?.as_str())
        .find_map(session_id_from_url)
}

/// Strategy 3: the payload itself is a URL.
pub fn from_payload_url(payload: &str) -> Option<String> {
    session_id_from_url(payload)
}

/// Strategy 4: `...session_id=<value>[&...]` anywhere in the text.
pub fn from_substring(payload: &str) -> Option<String> {
    SESSION_ID_PATTERN
        .captures(payload)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

fn session_id_from_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains(char::is_whitespace) {
        return None;
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(PLACEHOLDER_ORIGIN).ok()?.join(raw).ok()?
        }
        Err(_) => return None,
    };
    url.query_pairs()
        .find(|(key, _)| key == SESSION_ID_KEY)
        .map(|(_, value)| value.into_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
