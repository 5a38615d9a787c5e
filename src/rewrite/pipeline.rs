//! Mime-dispatched rewrite pipeline.
//!
//! # Responsibilities
//! - Route buffers to the correct external transformer by content class
//! - Carry the origin path as transformation context
//! - Render the terminal not-found page, degrading to a built-in body
//!
//! # Design Decisions
//! - The actual transformation rules live behind the `ContentRewriter`
//!   trait; this module owns only dispatch and fallback
//! - `Other` content is the identity law: returned byte-for-byte
//! - `not_found_page` never errors; a broken page template must not take
//!   down the terminal response path

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hyper::body::Bytes;

use crate::content::ContentClass;

/// Body served when the 404 page template itself cannot be read.
const BUILTIN_NOT_FOUND: &str = "<!DOCTYPE html><html><head><title>Not Found</title></head><body><h1>404</h1></body></html>";

/// Error from the rewrite pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),
    #[error("transform failed: {0}")]
    Transform(String),
}

/// External transformation capability, one method per recognized class.
///
/// Implementations relocate URLs, inject client scripts and so on; the
/// `origin` argument is the logical path the buffer was served from, used
/// to correct relative references.
#[async_trait]
pub trait ContentRewriter: Send + Sync {
    async fn html(&self, input: Bytes, origin: &str) -> Result<Bytes, RewriteError>;
    async fn javascript(&self, input: Bytes, origin: &str) -> Result<Bytes, RewriteError>;
    async fn css(&self, input: Bytes, origin: &str) -> Result<Bytes, RewriteError>;
}

/// A rewriter that performs no transformation.
///
/// Lets the gateway run standalone before a rewriting engine is plugged in.
pub struct IdentityRewriter;

#[async_trait]
impl ContentRewriter for IdentityRewriter {
    async fn html(&self, input: Bytes, _origin: &str) -> Result<Bytes, RewriteError> {
        Ok(input)
    }

    async fn javascript(&self, input: Bytes, _origin: &str) -> Result<Bytes, RewriteError> {
        Ok(input)
    }

    async fn css(&self, input: Bytes, _origin: &str) -> Result<Bytes, RewriteError> {
        Ok(input)
    }
}

/// Dispatches buffers to the configured rewriter by content class.
#[derive(Clone)]
pub struct RewritePipeline {
    rewriter: Arc<dyn ContentRewriter>,
    not_found_path: PathBuf,
}

impl RewritePipeline {
    pub fn new(rewriter: Arc<dyn ContentRewriter>, pages_root: &Path) -> Self {
        Self {
            rewriter,
            not_found_path: pages_root.join("404.html"),
        }
    }

    /// Transform `input` according to its content class.
    ///
    /// Html/Javascript/Css route to the external transformer; everything
    /// else passes through unmodified.
    pub async fn rewrite(
        &self,
        input: Bytes,
        class: ContentClass,
        origin: &str,
    ) -> Result<Bytes, RewriteError> {
        match class {
            ContentClass::Html => self.rewriter.html(input, origin).await,
            ContentClass::Javascript => self.rewriter.javascript(input, origin).await,
            ContentClass::Css => self.rewriter.css(input, origin).await,
            ContentClass::Other => Ok(input),
        }
    }

    /// Read a file and rewrite it in one step.
    pub async fn rewrite_file(
        &self,
        path: &Path,
        class: ContentClass,
        origin: &str,
    ) -> Result<Bytes, RewriteError> {
        let raw = tokio::fs::read(path).await?;
        self.rewrite(Bytes::from(raw), class, origin).await
    }

    /// The rewritten not-found page body.
    ///
    /// Degrades to a built-in minimal page if the template is missing or
    /// the transformer fails; this path must never surface an error.
    pub async fn not_found_page(&self) -> Bytes {
        match self
            .rewrite_file(&self.not_found_path, ContentClass::Html, "/404.html")
            .await
        {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(
                    page = %self.not_found_path.display(),
                    %error,
                    "Falling back to built-in 404 body"
                );
                Bytes::from_static(BUILTIN_NOT_FOUND.as_bytes())
            }
        }
    }
}
