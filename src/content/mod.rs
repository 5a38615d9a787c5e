//! Content resolution and classification.
//!
//! # Responsibilities
//! - Resolve attacker-controlled logical paths to files under trusted roots
//! - Classify content for the rewrite dispatch

pub mod classify;
pub mod resolver;

pub use classify::{guess_content_type, ContentClass};
pub use resolver::resolve;
