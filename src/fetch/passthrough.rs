//! Passthrough CDN fetch proxy.
//!
//! # Responsibilities
//! - Map inbound CDN paths to upstream origin URLs via ordered prefix rules
//! - Fetch upstream content and augment HTML with the injected client script
//! - Collapse upstream failures into the dispatcher's terminal fallback
//!
//! # Design Decisions
//! - Content type is derived from the mapped upstream URL, never from
//!   upstream response headers (the consuming client code relies on it)
//! - `.unityweb` payloads get no content-type header at all; setting one
//!   corrupts the delivery expectations of the Unity loader
//! - Upstream non-200 falls through to later routing rules; only network
//!   failure is terminal
//! - No caching: every request re-fetches upstream (documented limitation)

use std::path::Path;
use std::time::Duration;

use hyper::body::Bytes;

use crate::config::CdnConfig;
use crate::content::{guess_content_type, ContentClass};

/// Extensions exempted from any content-type header.
const NO_CONTENT_TYPE_EXTS: &[&str] = &["unityweb"];

/// A prefix-to-origin mapping rule.
#[derive(Debug, Clone)]
pub struct OriginRule {
    prefix: String,
    origin: String,
}

/// Outcome of a passthrough fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdnOutcome {
    /// Upstream returned 200; serve this body.
    Served {
        /// Header value, or `None` for exempted binary extensions.
        content_type: Option<String>,
        body: Bytes,
    },
    /// No rule matched or upstream returned non-200; continue the chain.
    Fallthrough,
    /// Network-level failure; the caller renders the terminal not-found page.
    Failed,
}

/// Fetches remote assets on behalf of the client and augments them.
pub struct PassthroughProxy {
    client: reqwest::Client,
    rules: Vec<OriginRule>,
    inject_tag: String,
}

impl PassthroughProxy {
    pub fn new(config: &CdnConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            rules: config
                .rules
                .iter()
                .map(|r| OriginRule {
                    prefix: r.prefix.clone(),
                    origin: r.origin.clone(),
                })
                .collect(),
            inject_tag: format!(
                "<script src='{}' preload='true'></script>",
                config.inject_script
            ),
        })
    }

    /// Map a request path to its upstream URL: first matching rule wins,
    /// the prefix is stripped and the remainder appended to the origin.
    pub fn map_upstream(&self, path: &str) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| path.starts_with(&rule.prefix))
            .map(|rule| format!("{}{}", rule.origin, &path[rule.prefix.len()..]))
    }

    /// Fetch the mapped upstream resource and prepare it for delivery.
    pub async fn fetch_and_rewrite(&self, path: &str) -> CdnOutcome {
        let Some(target) = self.map_upstream(path) else {
            return CdnOutcome::Fallthrough;
        };

        tracing::debug!(path = %path, target = %target, "Passthrough fetch");

        let response = match self.client.get(&target).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(target = %target, %error, "Upstream fetch failed");
                return CdnOutcome::Failed;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!(
                target = %target,
                status = %response.status(),
                "Upstream non-200, falling through"
            );
            return CdnOutcome::Fallthrough;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(target = %target, %error, "Upstream body read failed");
                return CdnOutcome::Failed;
            }
        };

        CdnOutcome::Served {
            content_type: upstream_content_type(&target),
            body: self.augment(&target, body),
        }
    }

    /// Append the injected script tag to HTML payloads.
    fn augment(&self, target: &str, body: Bytes) -> Bytes {
        if ContentClass::from_path(Path::new(target)) == ContentClass::Html {
            let mut augmented = Vec::with_capacity(body.len() + self.inject_tag.len());
            augmented.extend_from_slice(&body);
            augmented.extend_from_slice(self.inject_tag.as_bytes());
            Bytes::from(augmented)
        } else {
            body
        }
    }
}

/// Content-type header for a mapped upstream URL, honoring the exemptions.
fn upstream_content_type(target: &str) -> Option<String> {
    let path = Path::new(target);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    if let Some(ext) = &ext {
        if NO_CONTENT_TYPE_EXTS.contains(&ext.as_str()) {
            return None;
        }
    }

    // Recognized classes use their canonical type; everything else is guessed.
    match ContentClass::from_path(path) {
        ContentClass::Other => Some(guess_content_type(path)),
        class => class.content_type().map(str::to_string),
    }
}
