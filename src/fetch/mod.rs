//! Remote fetch passthrough subsystem.

pub mod passthrough;

pub use passthrough::{CdnOutcome, PassthroughProxy};
