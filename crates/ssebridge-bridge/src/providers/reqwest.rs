//! HTTP transport backed by `reqwest`.
//!
//! One client serves both capabilities. No whole-request timeout is set on
//! the client because the SSE response is long-lived; POSTs are bounded by
//! the outbound forwarder instead.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use ssebridge_core::{InboundEvent, TransportError};
use tracing::trace;
use url::Url;

use crate::transport::{EventSource, EventStream, MessagePoster, PostResponse};

/// TCP connect bound for both the subscription and POSTs.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `EventSource` + `MessagePoster` over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with default client settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .user_agent(concat!("ssebridge/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for ReqwestTransport {
    async fn subscribe(&self, url: &Url) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let events = response.bytes_stream().eventsource().map(|item| match item {
            Ok(event) => {
                trace!(event = %event.event, id = %event.id, "sse frame");
                Ok(InboundEvent::new(event.event, event.data))
            }
            Err(err) => Err(TransportError::Stream(err.to_string())),
        });
        Ok(Box::pin(events))
    }
}

#[async_trait]
impl MessagePoster for ReqwestTransport {
    async fn post(&self, url: &Url, body: String) -> Result<PostResponse, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(PostResponse { status, body })
    }
}

/// Map a `reqwest` failure onto the transport taxonomy.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::ConnectionRefused(error_chain(&err))
    } else {
        TransportError::Network(error_chain(&err))
    }
}

/// `reqwest` hides the useful part ("Connection refused (os error 111)")
/// in the source chain.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_transport() {
        let transport = ReqwestTransport::new();
        drop(transport);
    }

    #[test]
    fn default_impl() {
        let transport = ReqwestTransport::default();
        drop(transport);
    }

    #[tokio::test]
    async fn unreachable_port_is_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("http://127.0.0.1:{port}/messages/")).unwrap();
        let err = ReqwestTransport::new()
            .post(&url, "{}".into())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionRefused(_)), "got {err:?}");
    }
}
