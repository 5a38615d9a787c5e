//! Gateway server: one listening socket, three transports.
//!
//! # Responsibilities
//! - Accept TCP connections and serve HTTP/1.1 with upgrade support
//! - Probe the bare proxy ahead of the dispatch chain for both event types
//! - Delegate claimed upgrades; drop unclaimed ones with no bytes written
//! - Graceful shutdown on Ctrl+C
//!
//! # Design Decisions
//! - Protocol classification happens here, before any routing layer, so
//!   the collaborators see the raw event exactly once
//! - An unclaimed upgrade returns a service error; hyper then tears the
//!   connection down without writing a response

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Request};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::dispatch::{classify_upgrade, Dispatcher, UpgradeRoute};
use crate::http::{GatewayError, GatewayResponse};
use crate::transports::{BareTransport, TunnelTransport};

/// The gateway's connection-serving loop.
pub struct GatewayServer {
    dispatcher: Arc<Dispatcher>,
    bare: Arc<dyn BareTransport>,
    tunnel: Arc<dyn TunnelTransport>,
}

impl GatewayServer {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        bare: Arc<dyn BareTransport>,
        tunnel: Arc<dyn TunnelTransport>,
    ) -> Self {
        Self {
            dispatcher,
            bare,
            tunnel,
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let dispatcher = self.dispatcher.clone();
                            let bare = self.bare.clone();
                            let tunnel = self.tunnel.clone();
                            tokio::spawn(handle_connection(stream, peer, dispatcher, bare, tunnel));
                        }
                        Err(error) => {
                            tracing::warn!(%error, "Accept failed");
                        }
                    }
                }
            }
        }

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    bare: Arc<dyn BareTransport>,
    tunnel: Arc<dyn TunnelTransport>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let dispatcher = dispatcher.clone();
        let bare = bare.clone();
        let tunnel = tunnel.clone();
        async move { serve(req, dispatcher, bare, tunnel).await }
    });

    if let Err(error) = http1::Builder::new()
        .serve_connection(io, service)
        .with_upgrades()
        .await
    {
        // Dropped upgrades and client disconnects land here; not a fault.
        tracing::debug!(peer = %peer, %error, "Connection closed");
    }
}

/// Classify one inbound event and hand it to the right consumer.
async fn serve(
    req: Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
    bare: Arc<dyn BareTransport>,
    tunnel: Arc<dyn TunnelTransport>,
) -> Result<GatewayResponse, GatewayError> {
    if req.headers().contains_key(header::UPGRADE) {
        return serve_upgrade(req, dispatcher, bare, tunnel).await;
    }

    // Bare proxy probes ahead of the dispatch chain.
    if bare.should_route(&req) {
        return Ok(bare.route_request(req).await?);
    }

    let (head, _body) = req.into_parts();
    Ok(dispatcher.dispatch(&head).await)
}

async fn serve_upgrade(
    mut req: Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
    bare: Arc<dyn BareTransport>,
    tunnel: Arc<dyn TunnelTransport>,
) -> Result<GatewayResponse, GatewayError> {
    let bare_claims = bare.should_route(&req);
    let on_upgrade = hyper::upgrade::on(&mut req);
    let (head, _body) = req.into_parts();

    match classify_upgrade(bare_claims, &head.uri, dispatcher.tunnel_suffix()) {
        UpgradeRoute::Bare => Ok(bare.route_upgrade(head, on_upgrade).await?),
        UpgradeRoute::Tunnel => Ok(tunnel.route_upgrade(head, on_upgrade).await?),
        UpgradeRoute::Reject => {
            tracing::debug!(path = %head.uri.path(), "Unclaimed upgrade, dropping connection");
            Err(GatewayError::UpgradeRejected)
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
