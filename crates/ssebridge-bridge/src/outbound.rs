//! Outbound forwarder: stdin lines (and liveness pings) to HTTP POSTs.
//!
//! [`OutboundForwarder::submit`] is the single entry point for both origins,
//! so the readiness gate is applied identically. Accepted requests run as
//! tasks on the caller's `JoinSet`; results come back as [`Delivery`] values
//! and are turned into output by [`report`]. Completion order is not
//! submission order.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use ssebridge_core::events::single_line;
use ssebridge_core::{
    DeliveryError, DropReason, Endpoints, OutboundRequest, Session, SessionId,
};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::transport::MessagePoster;

/// Outcome of one dispatched POST.
#[derive(Debug)]
pub struct Delivery {
    /// What was sent.
    pub request: OutboundRequest,
    /// Session the POST was addressed to.
    pub session_id: SessionId,
    /// Response body on success.
    pub result: Result<String, DeliveryError>,
    /// Wall time from dispatch to completion.
    pub elapsed: Duration,
}

/// A request rejected by the readiness gate.
#[derive(Debug)]
pub struct Dropped {
    /// Why it was not sent.
    pub reason: DropReason,
    /// The rejected request.
    pub request: OutboundRequest,
}

impl Dropped {
    /// JSON-RPC error reply for the client, if the request deserves one.
    pub fn error_reply(&self) -> Option<String> {
        self.request.error_reply(
            self.reason.rpc_code(),
            &format!("request dropped: {}", self.reason),
            self.reason.kind(),
        )
    }
}

/// Gates and dispatches outbound requests.
pub struct OutboundForwarder {
    poster: Arc<dyn MessagePoster>,
    endpoints: Endpoints,
    timeout: Duration,
}

impl OutboundForwarder {
    /// Forwarder posting to `endpoints` with a per-request `timeout`.
    pub fn new(poster: Arc<dyn MessagePoster>, endpoints: Endpoints, timeout: Duration) -> Self {
        Self {
            poster,
            endpoints,
            timeout,
        }
    }

    /// Dispatch `request` if the session is ready, otherwise drop it.
    ///
    /// Connectivity is checked before the identifier. Nothing is queued.
    pub fn submit(
        &self,
        request: OutboundRequest,
        session: &Session,
        in_flight: &mut JoinSet<Delivery>,
    ) -> Result<(), Dropped> {
        let session_id = match session.readiness() {
            Ok(id) => id.clone(),
            Err(reason) => {
                warn!(
                    reason = %reason,
                    origin = ?request.origin(),
                    state = %session.state(),
                    "dropping outbound message"
                );
                return Err(Dropped { reason, request });
            }
        };

        let url = self.endpoints.messages_url(&session_id);
        let poster = Arc::clone(&self.poster);
        let timeout = self.timeout;
        debug!(session_id = %session_id, origin = ?request.origin(), "posting message");

        let _ = in_flight.spawn(async move {
            let started = Instant::now();
            let result = deliver(poster.as_ref(), &url, request.body().to_owned(), timeout).await;
            Delivery {
                request,
                session_id,
                result,
                elapsed: started.elapsed(),
            }
        });
        Ok(())
    }
}

async fn deliver(
    poster: &dyn MessagePoster,
    url: &Url,
    body: String,
    timeout: Duration,
) -> Result<String, DeliveryError> {
    let response = tokio::time::timeout(timeout, poster.post(url, body))
        .await
        .map_err(|_| DeliveryError::Timeout)??;
    if !response.is_success() {
        return Err(DeliveryError::from_status(response.status, response.body));
    }
    Ok(response.body)
}

/// Log a completed delivery and return the line to write to stdout, if any.
///
/// JSON response bodies are forwarded like stream events. Empty and
/// non-JSON bodies (plain acknowledgements such as `Accepted`) are logged at
/// debug and deliberately not written, so stdout only ever carries protocol
/// messages. Failures are logged by category and, with `mirror_errors`,
/// echoed to the client as a JSON-RPC error when the request carried an `id`.
pub fn report(delivery: &Delivery, mirror_errors: bool) -> Option<String> {
    let elapsed_ms = u64::try_from(delivery.elapsed.as_millis()).unwrap_or(u64::MAX);
    let session_id = delivery.session_id.as_str();
    let origin = delivery.request.origin();

    let err = match &delivery.result {
        Ok(body) => return response_line(body, elapsed_ms),
        Err(err) => err,
    };

    let kind = err.category();
    match err {
        DeliveryError::EndpointMissing => warn!(
            session_id, status = 404_u16, %kind, ?origin,
            "message endpoint not found; the server may not serve /messages/ or the session expired"
        ),
        DeliveryError::SessionRejected { status } => warn!(
            session_id, status, %kind, ?origin,
            "server rejected the session"
        ),
        DeliveryError::Http { status, body } => warn!(
            session_id, status, %kind, ?origin, body = %body,
            "POST failed"
        ),
        DeliveryError::Timeout => warn!(
            session_id, %kind, ?origin, elapsed_ms,
            "POST timed out"
        ),
        DeliveryError::ConnectionRefused(detail) => warn!(
            session_id, %kind, ?origin, error = %detail,
            "POST connection refused"
        ),
        DeliveryError::Network(detail) => warn!(
            session_id, %kind, ?origin, error = %detail,
            "POST failed"
        ),
    }

    if !mirror_errors {
        return None;
    }
    delivery
        .request
        .error_reply(err.rpc_code(), &err.to_string(), &kind.to_string())
}

fn response_line(body: &str, elapsed_ms: u64) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        debug!(elapsed_ms, "POST accepted");
        return None;
    }
    if serde_json::from_str::<Value>(body).is_err() {
        debug!(elapsed_ms, body, "POST acknowledged; non-JSON body not forwarded");
        return None;
    }
    debug!(elapsed_ms, "POST answered directly");
    Some(single_line(body))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
