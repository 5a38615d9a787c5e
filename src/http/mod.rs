//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection loop, upgrade detection)
//!     → bare-proxy probe (first-priority, both event types)
//!     → dispatch::Dispatcher (HTTP chain) | dispatch upgrade chain
//!     → response bytes | delegated socket
//! ```

pub mod server;

use http_body_util::Full;
use hyper::body::Bytes;

pub use server::GatewayServer;

/// Response body type: content is fully materialized before delivery.
pub type GatewayBody = Full<Bytes>;

/// Response type shared across the dispatcher and transports.
pub type GatewayResponse = hyper::Response<GatewayBody>;

/// Top-level service error.
///
/// Returning an error from the connection service makes hyper drop the
/// connection without writing a response; `UpgradeRejected` relies on
/// this to tear down unclaimed upgrades with no bytes sent.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("upgrade rejected")]
    UpgradeRejected,
    #[error(transparent)]
    Transport(#[from] crate::transports::TransportError),
}
