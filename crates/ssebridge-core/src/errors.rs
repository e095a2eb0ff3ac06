//! Error taxonomy for the bridge.
//!
//! - [`EndpointError`]: startup-fatal base-URL validation failures
//! - [`TransportError`]: raw failures reported by the SSE/HTTP capability providers
//! - [`DeliveryError`]: classified outcome of a failed outbound POST
//! - [`DropReason`]: why an outbound request was rejected before dispatch
//!
//! Nothing except [`EndpointError`] is fatal. Every other error is reported
//! once and the bridge keeps running in degraded mode.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid server base URL. Reported before any I/O starts.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The value is not a URL at all.
    #[error("invalid URL '{input}': {source}")]
    Parse {
        /// The rejected input.
        input: String,
        /// Underlying parser error.
        #[source]
        source: url::ParseError,
    },
    /// Only `http` and `https` are supported.
    #[error("unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
    /// URL lacks a host component.
    #[error("URL '{0}' has no host")]
    MissingHost(String),
}

/// Failure reported by a transport capability provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its time bound.
    #[error("request timed out")]
    Timeout,
    /// The TCP connection could not be established.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (may be empty).
        body: String,
    },
    /// The event stream broke mid-flight.
    #[error("stream error: {0}")]
    Stream(String),
    /// Any other network failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Category of a [`DeliveryError`], used as a structured log field and in
/// mirrored error objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 404: the messages endpoint does not exist.
    EndpointMissing,
    /// 401/403: the server rejected the session or credentials.
    SessionRejected,
    /// Any other non-success status.
    Http,
    /// The POST exceeded its timeout.
    Timeout,
    /// The server refused the connection.
    ConnectionRefused,
    /// Unclassified network failure.
    Network,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndpointMissing => write!(f, "endpoint_missing"),
            Self::SessionRejected => write!(f, "session_rejected"),
            Self::Http => write!(f, "http"),
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionRefused => write!(f, "connection_refused"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Classified failure of an outbound POST.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// 404 from the messages endpoint.
    #[error("messages endpoint not found (HTTP 404)")]
    EndpointMissing,
    /// 401 or 403: session invalid or authentication required.
    #[error("session rejected by server (HTTP {status})")]
    SessionRejected {
        /// 401 or 403.
        status: u16,
    },
    /// Other non-success status.
    #[error("HTTP error {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body (may be empty).
        body: String,
    },
    /// POST exceeded its timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection refused by the server.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    /// Generic network failure.
    #[error("network failure: {0}")]
    Network(String),
}

impl DeliveryError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => Self::EndpointMissing,
            401 | 403 => Self::SessionRejected { status },
            _ => Self::Http { status, body },
        }
    }

    /// Category for structured logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EndpointMissing => ErrorCategory::EndpointMissing,
            Self::SessionRejected { .. } => ErrorCategory::SessionRejected,
            Self::Http { .. } => ErrorCategory::Http,
            Self::Timeout => ErrorCategory::Timeout,
            Self::ConnectionRefused(_) => ErrorCategory::ConnectionRefused,
            Self::Network(_) => ErrorCategory::Network,
        }
    }

    /// JSON-RPC error code used when the failure is mirrored to stdout.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::EndpointMissing => -32001,
            Self::SessionRejected { .. } => -32002,
            Self::Http { .. } => -32003,
            Self::Timeout => -32004,
            Self::ConnectionRefused(_) => -32005,
            Self::Network(_) => -32006,
        }
    }
}

impl From<TransportError> for DeliveryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::ConnectionRefused(msg) => Self::ConnectionRefused(msg),
            TransportError::Status { status, body } => Self::from_status(status, body),
            TransportError::Stream(msg) | TransportError::Network(msg) => Self::Network(msg),
        }
    }
}

/// Why an outbound request was dropped without a POST.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The SSE stream is not open.
    NoConnection,
    /// The stream is open but the handshake has not produced an identifier.
    AwaitingSession,
}

impl DropReason {
    /// JSON-RPC error code used when the drop is mirrored to stdout.
    pub fn rpc_code(self) -> i64 {
        match self {
            Self::NoConnection => -32010,
            Self::AwaitingSession => -32011,
        }
    }

    /// Machine-readable label, matching the serde representation.
    pub fn kind(self) -> &'static str {
        match self {
            Self::NoConnection => "no_connection",
            Self::AwaitingSession => "awaiting_session",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConnection => write!(f, "no connection"),
            Self::AwaitingSession => write!(f, "awaiting session"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
