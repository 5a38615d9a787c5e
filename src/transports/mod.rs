//! External transport collaborators.
//!
//! # Responsibilities
//! - Define the interface boundary for the bare proxy and the tunnel
//! - Provide inert default implementations so the gateway runs standalone
//!
//! # Design Decisions
//! - Both collaborators are opaque capabilities: the dispatcher only asks
//!   "do you claim this?" and hands the event over; it never inspects what
//!   happens on the delegated connection
//! - Upgrade delegation returns the handshake response; the collaborator
//!   drives the upgraded IO from the `OnUpgrade` future it was given

use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::http::request::Parts;
use hyper::upgrade::OnUpgrade;
use hyper::Request;

use crate::http::GatewayResponse;

/// Error from a transport collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No collaborator is registered for this event.
    #[error("transport unavailable")]
    Unavailable,
    #[error("transport failed: {0}")]
    Failed(String),
}

/// CONNECT-style bare proxy collaborator.
///
/// First-priority classifier for both requests and upgrades; when it
/// claims an event the dispatcher takes no further action.
#[async_trait]
pub trait BareTransport: Send + Sync {
    /// Whether this request or upgrade belongs to the bare proxy.
    fn should_route(&self, req: &Request<Incoming>) -> bool;

    /// Handle a claimed plain request end to end.
    async fn route_request(&self, req: Request<Incoming>) -> Result<GatewayResponse, TransportError>;

    /// Handle a claimed upgrade: return the handshake response and drive
    /// the upgraded connection from `on_upgrade`.
    async fn route_upgrade(
        &self,
        head: Parts,
        on_upgrade: OnUpgrade,
    ) -> Result<GatewayResponse, TransportError>;
}

/// Tunneling protocol collaborator for upgrade URLs ending in the
/// configured endpoint suffix.
#[async_trait]
pub trait TunnelTransport: Send + Sync {
    async fn route_upgrade(
        &self,
        head: Parts,
        on_upgrade: OnUpgrade,
    ) -> Result<GatewayResponse, TransportError>;
}

/// Bare transport that claims nothing.
pub struct NullBare;

#[async_trait]
impl BareTransport for NullBare {
    fn should_route(&self, _req: &Request<Incoming>) -> bool {
        false
    }

    async fn route_request(
        &self,
        _req: Request<Incoming>,
    ) -> Result<GatewayResponse, TransportError> {
        Err(TransportError::Unavailable)
    }

    async fn route_upgrade(
        &self,
        _head: Parts,
        _on_upgrade: OnUpgrade,
    ) -> Result<GatewayResponse, TransportError> {
        Err(TransportError::Unavailable)
    }
}

/// Tunnel transport that drops every delegated upgrade.
pub struct NullTunnel;

#[async_trait]
impl TunnelTransport for NullTunnel {
    async fn route_upgrade(
        &self,
        _head: Parts,
        _on_upgrade: OnUpgrade,
    ) -> Result<GatewayResponse, TransportError> {
        Err(TransportError::Unavailable)
    }
}
