//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Content roots for the application shell and gated assets.
    pub content: ContentConfig,

    /// Passthrough CDN proxy settings.
    pub cdn: CdnConfig,

    /// Single-use token store bounds.
    pub tokens: TokenConfig,

    /// Service-worker scope allow list.
    pub service_worker: ServiceWorkerConfig,

    /// Tunneling transport settings.
    pub tunnel: TunnelConfig,

    /// Transport static asset mounts.
    pub mounts: Vec<MountConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Filesystem roots the gateway serves from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Root for application static files.
    pub static_root: PathBuf,

    /// Root for directly addressable and token-gated assets.
    pub assets_root: PathBuf,

    /// Root holding error/page templates (404.html).
    pub pages_root: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            static_root: PathBuf::from("static"),
            assets_root: PathBuf::from("static/assets"),
            pages_root: PathBuf::from("pages"),
        }
    }
}

/// Passthrough CDN proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CdnConfig {
    /// URL prefix that routes into the passthrough proxy.
    pub prefix: String,

    /// Ordered origin mapping rules; first matching prefix wins.
    pub rules: Vec<OriginRuleConfig>,

    /// Client-side script injected into proxied HTML responses.
    pub inject_script: String,

    /// Upstream fetch timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            prefix: "/cdn/".to_string(),
            rules: vec![
                OriginRuleConfig {
                    prefix: "/cdn/3kh0/".to_string(),
                    origin: "https://player.work/".to_string(),
                },
                OriginRuleConfig {
                    prefix: "/cdn/".to_string(),
                    origin: "https://awokenyt.github.io/gamestorage/".to_string(),
                },
            ],
            inject_script: "/assets/js/cdn.inject.js".to_string(),
            timeout_secs: 30,
        }
    }
}

/// A single prefix-to-origin mapping rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OriginRuleConfig {
    /// Request path prefix to match (must start and end with '/').
    pub prefix: String,

    /// Upstream base URL the stripped remainder is appended to.
    pub origin: String,
}

/// Bounds on the in-memory token store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Maximum number of outstanding tokens before the oldest are evicted.
    pub max_entries: usize,

    /// Maximum age in seconds before an abandoned token is pruned.
    pub max_age_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_age_secs: 600,
        }
    }
}

/// Paths permitted to register a root-scoped service worker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceWorkerConfig {
    /// Exact request paths that receive `Service-Worker-Allowed: /`.
    pub allowed_paths: Vec<String>,
}

impl Default for ServiceWorkerConfig {
    fn default() -> Self {
        Self {
            allowed_paths: vec![
                "/uv/sw.js".to_string(),
                "/assets/js/offline.js".to_string(),
            ],
        }
    }
}

/// Tunneling transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Upgrade URLs ending with this suffix are delegated to the tunnel.
    pub endpoint_suffix: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            endpoint_suffix: "/wisp/".to_string(),
        }
    }
}

/// A transport library's static asset bundle mounted at a URL prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MountConfig {
    /// URL prefix the bundle is mounted at (e.g., "/uv/").
    pub prefix: String,

    /// Filesystem root of the bundle.
    pub root: PathBuf,

    /// File extension forced to a `text/javascript` content type.
    #[serde(default = "default_forced_script_ext")]
    pub forced_script_ext: String,
}

fn default_forced_script_ext() -> String {
    ".cjs".to_string()
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Whether to expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Address for the metrics exporter.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_deployment_layout() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.cdn.rules.len(), 2);
        assert_eq!(config.cdn.rules[0].prefix, "/cdn/3kh0/");
        assert_eq!(config.tunnel.endpoint_suffix, "/wisp/");
        assert!(config
            .service_worker
            .allowed_paths
            .contains(&"/uv/sw.js".to_string()));
    }

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:3000"

            [[mounts]]
            prefix = "/uv/"
            root = "vendor/uv"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");
        assert_eq!(config.mounts.len(), 1);
        assert_eq!(config.mounts[0].forced_script_ext, ".cjs");
        // Untouched sections fall back to defaults.
        assert_eq!(config.cdn.prefix, "/cdn/");
    }
}
