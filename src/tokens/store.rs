//! Single-use token store for gated asset delivery.
//!
//! # Responsibilities
//! - Issue unguessable token ids referencing a prepared asset descriptor
//! - Consume tokens exactly once, atomically, under concurrent access
//! - Bound total stored tokens (count and age) against abandonment
//!
//! # Design Decisions
//! - `consume` is a single map removal; there is deliberately no
//!   check-then-delete pair anywhere, so two racing consumers of the
//!   same id can never both win
//! - A consumed token and an id that never existed are indistinguishable
//! - Tokens live in memory only; nothing survives a restart

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::TokenConfig;

/// A file already resolved to be safe to serve, plus the content type
/// to present. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// Content type presented to the client.
    pub content_type: String,
    /// Absolute path of the source file.
    pub source_path: PathBuf,
}

/// What a token grants access to.
///
/// Closed enum rather than a stringly-typed kind field; new token kinds
/// extend the enum and every consumer match site is compiler-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPayload {
    Asset(AssetDescriptor),
}

struct TokenEntry {
    payload: TokenPayload,
    created_at: Instant,
}

/// A concurrency-safe store of single-flight tokens.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<DashMap<String, TokenEntry>>,
    max_entries: usize,
    max_age: Duration,
}

impl TokenStore {
    /// Create a store bounded by the configured entry count and age.
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_entries: config.max_entries,
            max_age: Duration::from_secs(config.max_age_secs),
        }
    }

    /// Issue a new token for `payload` and return its opaque id.
    ///
    /// Ids are v4 UUIDs; concurrent issues never collide.
    pub fn issue(&self, payload: TokenPayload) -> String {
        self.prune();

        let id = Uuid::new_v4().simple().to_string();
        self.inner.insert(
            id.clone(),
            TokenEntry {
                payload,
                created_at: Instant::now(),
            },
        );

        crate::observability::metrics::record_token_issued();
        tracing::debug!(outstanding = self.inner.len(), "Token issued");
        id
    }

    /// Pure membership probe; never mutates the store.
    pub fn exists(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    /// Atomically look up and delete a token.
    ///
    /// Exactly one caller presenting a given id receives the payload;
    /// every other caller gets `None`.
    pub fn consume(&self, id: &str) -> Option<TokenPayload> {
        self.inner.remove(id).map(|(_, entry)| entry.payload)
    }

    /// Number of outstanding tokens.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop aged-out entries and, if still over capacity, the oldest ones.
    ///
    /// Runs opportunistically on `issue`; a live token within bounds is
    /// never touched.
    fn prune(&self) {
        let cutoff = Instant::now().checked_sub(self.max_age);
        if let Some(cutoff) = cutoff {
            self.inner.retain(|_, entry| entry.created_at > cutoff);
        }

        let excess = self.inner.len().saturating_sub(self.max_entries.saturating_sub(1));
        if excess > 0 {
            let mut oldest: Vec<(String, Instant)> = self
                .inner
                .iter()
                .map(|r| (r.key().clone(), r.value().created_at))
                .collect();
            oldest.sort_by_key(|(_, created)| *created);

            for (id, _) in oldest.into_iter().take(excess) {
                self.inner.remove(&id);
            }
            tracing::warn!(evicted = excess, "Token store over capacity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(path: &str) -> TokenPayload {
        TokenPayload::Asset(AssetDescriptor {
            content_type: "text/html".to_string(),
            source_path: PathBuf::from(path),
        })
    }

    fn store() -> TokenStore {
        TokenStore::new(&TokenConfig::default())
    }

    #[test]
    fn consume_returns_payload_exactly_once() {
        let store = store();
        let id = store.issue(asset("/tmp/a.html"));

        assert!(store.exists(&id));
        assert_eq!(store.consume(&id), Some(asset("/tmp/a.html")));

        // Second consume is indistinguishable from an invalid id.
        assert!(!store.exists(&id));
        assert_eq!(store.consume(&id), None);
        assert_eq!(store.consume("never-issued"), None);
    }

    #[test]
    fn exists_does_not_consume() {
        let store = store();
        let id = store.issue(asset("/tmp/a.html"));

        for _ in 0..3 {
            assert!(store.exists(&id));
        }
        assert!(store.consume(&id).is_some());
    }

    #[test]
    fn ids_are_unique() {
        let store = store();
        let a = store.issue(asset("/tmp/a"));
        let b = store.issue(asset("/tmp/b"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn concurrent_consume_has_one_winner() {
        let store = store();
        let id = store.issue(asset("/tmp/a.html"));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { store.consume(&id).is_some() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let store = TokenStore::new(&TokenConfig {
            max_entries: 4,
            max_age_secs: 3600,
        });

        let first = store.issue(asset("/tmp/0"));
        for i in 1..8 {
            store.issue(asset(&format!("/tmp/{i}")));
        }

        assert!(store.len() <= 4);
        assert!(!store.exists(&first));
    }

    #[test]
    fn aged_out_tokens_are_pruned() {
        let store = TokenStore::new(&TokenConfig {
            max_entries: 16,
            max_age_secs: 0,
        });

        let id = store.issue(asset("/tmp/a"));
        // Next issue prunes everything older than the zero-second window.
        store.issue(asset("/tmp/b"));
        assert!(!store.exists(&id));
    }
}
