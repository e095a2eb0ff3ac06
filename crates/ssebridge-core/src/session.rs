//! Bridge session state.
//!
//! [`Session`] is an explicit state object owned by the bridge event loop.
//! Every transition is a method call that returns the resulting
//! [`SessionState`], so the whole machine is testable without a network:
//!
//! ```text
//! Init -> Connecting -> ConnectedNoSession -> Ready
//!   \_________\_______________\_______________\___> Disconnected
//! ```
//!
//! There is no transition out of `Disconnected`; reconnection requires a
//! process restart. The identifier is set at most once and never cleared.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::errors::DropReason;

/// Opaque session token issued by the server during the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing token.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::ops::Deref for SessionId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Observable lifecycle state of the bridge session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created; no subscription requested yet.
    Init,
    /// Subscription requested, stream not open yet.
    Connecting,
    /// Stream open, handshake not resolved.
    ConnectedNoSession,
    /// Stream open and session identifier known. Outbound delivery allowed.
    Ready,
    /// Stream failed or closed. Terminal.
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Connecting => write!(f, "connecting"),
            Self::ConnectedNoSession => write!(f, "connected_no_session"),
            Self::Ready => write!(f, "ready"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Connection and handshake state for the single server session.
#[derive(Debug)]
pub struct Session {
    identifier: Option<SessionId>,
    connected: bool,
    lost: bool,
    open_requested_at: Option<Instant>,
    established_at: Option<Instant>,
    last_activity_at: Instant,
}

impl Session {
    /// Create a fresh session at process start.
    pub fn new(now: Instant) -> Self {
        Self {
            identifier: None,
            connected: false,
            lost: false,
            open_requested_at: None,
            established_at: None,
            last_activity_at: now,
        }
    }

    /// Current lifecycle state, derived from the underlying fields.
    pub fn state(&self) -> SessionState {
        match (self.connected, self.lost, &self.identifier) {
            (false, true, _) => SessionState::Disconnected,
            (false, false, _) if self.open_requested_at.is_some() => SessionState::Connecting,
            (false, false, _) => SessionState::Init,
            (true, _, None) => SessionState::ConnectedNoSession,
            (true, _, Some(_)) => SessionState::Ready,
        }
    }

    /// The subscription has been requested.
    pub fn begin_connecting(&mut self, now: Instant) -> SessionState {
        self.open_requested_at = Some(now);
        self.state()
    }

    /// The stream opened successfully.
    pub fn on_open(&mut self, now: Instant) -> SessionState {
        if self.lost {
            return self.state();
        }
        self.connected = true;
        self.established_at = Some(now);
        self.last_activity_at = now;
        self.state()
    }

    /// The stream failed or was closed by the server.
    pub fn on_error(&mut self) -> SessionState {
        self.connected = false;
        self.lost = true;
        self.state()
    }

    /// Record the session identifier.
    ///
    /// Returns `true` if this call set it, `false` if an identifier was
    /// already present (the existing one is kept).
    pub fn resolve(&mut self, id: SessionId) -> bool {
        if self.identifier.is_some() {
            return false;
        }
        self.identifier = Some(id);
        true
    }

    /// Record inbound activity.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity_at = now;
    }

    /// The resolved identifier, if any.
    pub fn identifier(&self) -> Option<&SessionId> {
        self.identifier.as_ref()
    }

    /// Whether the stream is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Gate for outbound delivery. Connectivity is checked before the
    /// identifier, so a lost stream always reports [`DropReason::NoConnection`].
    pub fn readiness(&self) -> Result<&SessionId, DropReason> {
        if !self.connected {
            return Err(DropReason::NoConnection);
        }
        self.identifier.as_ref().ok_or(DropReason::AwaitingSession)
    }

    /// Time since the subscription was requested.
    pub fn since_open_requested(&self, now: Instant) -> Option<Duration> {
        self.open_requested_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Time since the last inbound activity (or since open/creation).
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }

    /// How long ago the stream opened, if it ever did.
    pub fn connected_for(&self, now: Instant) -> Option<Duration> {
        self.established_at
            .map(|at| now.saturating_duration_since(at))
    }
}

/// Consecutive synthetic pings sent without an inbound event in between.
#[derive(Clone, Debug, Default)]
pub struct LivenessCounter {
    consecutive_heartbeats_without_reply: u32,
    warned: bool,
}

impl LivenessCounter {
    /// Count one more unanswered ping and return the new total.
    pub fn record_ping(&mut self) -> u32 {
        self.consecutive_heartbeats_without_reply =
            self.consecutive_heartbeats_without_reply.saturating_add(1);
        self.consecutive_heartbeats_without_reply
    }

    /// Any inbound event clears the counter and re-arms the warning.
    pub fn reset(&mut self) {
        self.consecutive_heartbeats_without_reply = 0;
        self.warned = false;
    }

    /// Current count.
    pub fn count(&self) -> u32 {
        self.consecutive_heartbeats_without_reply
    }

    /// Returns `true` exactly once per silence period, when the count first
    /// reaches `threshold`.
    pub fn take_warning(&mut self, threshold: u32) -> bool {
        if self.warned || self.consecutive_heartbeats_without_reply < threshold {
            return false;
        }
        self.warned = true;
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
