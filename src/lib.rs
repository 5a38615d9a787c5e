//! Browser-facing web gateway.
//!
//! Serves an application shell, proxies remote content through a rewrite
//! pipeline, and multiplexes three transports behind one listening socket:
//! ordinary HTTP routing, a CONNECT-style bare proxy, and a tunneling
//! upgrade protocol.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                    GATEWAY                        │
//!   request ───────┼─▶ http::server ──▶ bare probe ──▶ dispatch chain │
//!                  │                        │               │          │
//!                  │                        ▼               ▼          │
//!                  │                  bare transport   tokens/resolver │
//!                  │                                   fetch proxy     │
//!                  │                                        │          │
//!   response ◀─────┼────────────────────────────── rewrite pipeline   │
//!                  │                                                   │
//!   upgrade ───────┼─▶ http::server ──▶ bare | tunnel | drop socket   │
//!                  └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod content;
pub mod dispatch;
pub mod fetch;
pub mod http;
pub mod rewrite;
pub mod tokens;
pub mod transports;

// Cross-cutting concerns
pub mod observability;

pub use config::GatewayConfig;
pub use dispatch::Dispatcher;
pub use http::GatewayServer;
pub use tokens::TokenStore;
