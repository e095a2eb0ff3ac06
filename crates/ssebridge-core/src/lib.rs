//! # ssebridge-core
//!
//! Foundation types for the SSE stdio bridge. No network code lives here.
//!
//! - **Session**: [`Session`] state object, [`SessionState`] machine, [`SessionId`]
//! - **Handshake**: ordered, pure extraction strategies for the session identifier
//! - **Endpoints**: base-URL validation and derivation of the `/sse` and
//!   `/messages/` URLs
//! - **Events**: inbound SSE events, outbound requests and their one-line
//!   output rendering
//! - **Errors**: transport/delivery taxonomy via `thiserror`
//! - **Logging**: stderr `tracing` subscriber and test capture utilities

#![deny(unsafe_code)]

pub mod endpoints;
pub mod errors;
pub mod events;
pub mod handshake;
pub mod logging;
pub mod session;

pub use endpoints::Endpoints;
pub use errors::{DeliveryError, DropReason, EndpointError, ErrorCategory, TransportError};
pub use events::{InboundEvent, OutboundRequest, Origin};
pub use session::{LivenessCounter, Session, SessionId, SessionState};
