//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! request head
//!     → chain.rs (ordered probes, first match wins)
//!     → (tokens | resolver | passthrough proxy) → rewrite pipeline
//!     → response
//!
//! upgrade head
//!     → upgrade.rs (bare | tunnel | reject)
//!     → delegated collaborator, bypassing the pipeline
//! ```

pub mod chain;
pub mod upgrade;

pub use chain::{Dispatcher, RouteDecision};
pub use upgrade::{classify_upgrade, UpgradeRoute};
