//! Capability traits for the network side of the bridge.
//!
//! The bridge never talks to `reqwest` directly. It holds an
//! `Arc<dyn EventSource>` and an `Arc<dyn MessagePoster>`, so the event loop
//! can be driven end-to-end by in-memory fakes.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use ssebridge_core::{InboundEvent, TransportError};
use url::Url;

/// Stream of server pushes. Ends when the server closes the response.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<InboundEvent, TransportError>> + Send>>;

/// Subscribe to a stream of named events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open the subscription. Resolves once the server has accepted it.
    async fn subscribe(&self, url: &Url) -> Result<EventStream, TransportError>;
}

/// Status and body of a completed POST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body (may be empty).
    pub body: String,
}

impl PostResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issue an HTTP POST with a JSON body.
///
/// Non-2xx statuses are returned as `Ok`; only failures to get any response
/// at all are errors.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    /// Send `body` to `url`.
    async fn post(&self, url: &Url, body: String) -> Result<PostResponse, TransportError>;
}
