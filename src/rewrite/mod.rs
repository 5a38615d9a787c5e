//! Content rewriting subsystem.
//!
//! Owns dispatch by content class and the error-to-404 fallback page;
//! the transformation rules themselves live behind `ContentRewriter`.

pub mod pipeline;

pub use pipeline::{ContentRewriter, IdentityRewriter, RewriteError, RewritePipeline};
