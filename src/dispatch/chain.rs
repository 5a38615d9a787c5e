//! The ordered request dispatch chain.
//!
//! # Responsibilities
//! - Classify every inbound HTTP request against first-match-wins probes
//! - Broker token-gated and directly addressed asset delivery
//! - Render the single terminal not-found response for every failure
//!
//! # Design Decisions
//! - The chain is a visible `&[Probe]` slice evaluated in a loop, not
//!   implicit middleware threading; reordering it is a one-line diff
//! - Probes are read-only until a match commits to a response
//! - Every failure (missing file, consumed token, upstream fault,
//!   transformer error) collapses into the same 404 terminal response,
//!   so nothing leaks which step rejected the request

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{header, Response, StatusCode};
use http_body_util::Full;

use crate::config::{GatewayConfig, MountConfig};
use crate::content::{guess_content_type, resolve, ContentClass};
use crate::fetch::{CdnOutcome, PassthroughProxy};
use crate::http::GatewayResponse;
use crate::observability::metrics;
use crate::rewrite::RewritePipeline;
use crate::tokens::{TokenPayload, TokenStore};

const SERVICE_WORKER_ALLOWED: HeaderName = HeaderName::from_static("service-worker-allowed");

/// Result of evaluating one probe.
pub enum RouteDecision {
    /// The probe committed to this response; the chain stops.
    Handled(GatewayResponse),
    /// The probe does not apply; evaluate the next one.
    Continue,
}

/// The probes of the HTTP chain, in evaluation order.
#[derive(Debug, Clone, Copy)]
enum Probe {
    /// Remote passthrough fetch under the CDN prefix.
    PassthroughCdn,
    /// Attach the service-worker scope header; never short-circuits.
    ServiceWorkerAllow,
    /// Directly addressed asset via `?asset=<path>`.
    AssetQuery,
    /// Single-use token-gated asset under `/asset/<token>`.
    AssetToken,
    /// Application shell static files.
    AppStatic,
    /// Transport library asset bundles.
    TransportMounts,
}

const CHAIN: &[Probe] = &[
    Probe::PassthroughCdn,
    Probe::ServiceWorkerAllow,
    Probe::AssetQuery,
    Probe::AssetToken,
    Probe::AppStatic,
    Probe::TransportMounts,
];

impl Probe {
    fn label(self) -> &'static str {
        match self {
            Probe::PassthroughCdn => "cdn",
            Probe::ServiceWorkerAllow => "service_worker",
            Probe::AssetQuery => "asset_query",
            Probe::AssetToken => "asset_token",
            Probe::AppStatic => "app_static",
            Probe::TransportMounts => "mounts",
        }
    }
}

/// Top-level decision chain over every inbound HTTP request.
pub struct Dispatcher {
    tokens: TokenStore,
    pipeline: RewritePipeline,
    proxy: Arc<PassthroughProxy>,
    cdn_prefix: String,
    sw_allowed_paths: Vec<String>,
    static_root: PathBuf,
    assets_root: PathBuf,
    mounts: Vec<MountConfig>,
    tunnel_suffix: String,
}

impl Dispatcher {
    pub fn new(
        config: &GatewayConfig,
        tokens: TokenStore,
        pipeline: RewritePipeline,
        proxy: Arc<PassthroughProxy>,
    ) -> Self {
        // Canonical roots anchor the containment re-checks; fall back to
        // the configured path if the directory is absent at startup.
        let static_root = config
            .content
            .static_root
            .canonicalize()
            .unwrap_or_else(|_| config.content.static_root.clone());
        let assets_root = config
            .content
            .assets_root
            .canonicalize()
            .unwrap_or_else(|_| config.content.assets_root.clone());

        Self {
            tokens,
            pipeline,
            proxy,
            cdn_prefix: config.cdn.prefix.clone(),
            sw_allowed_paths: config.service_worker.allowed_paths.clone(),
            static_root,
            assets_root,
            mounts: config.mounts.clone(),
            tunnel_suffix: config.tunnel.endpoint_suffix.clone(),
        }
    }

    /// The tunnel endpoint suffix, used by the upgrade chain.
    pub fn tunnel_suffix(&self) -> &str {
        &self.tunnel_suffix
    }

    /// The token store brokering gated asset delivery.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Evaluate the chain for one request head and produce the response.
    pub async fn dispatch(&self, head: &Parts) -> GatewayResponse {
        let mut extra_headers = HeaderMap::new();

        for probe in CHAIN {
            let decision = match probe {
                Probe::PassthroughCdn => self.probe_cdn(head).await,
                Probe::ServiceWorkerAllow => self.probe_service_worker(head, &mut extra_headers),
                Probe::AssetQuery => self.probe_asset_query(head).await,
                Probe::AssetToken => self.probe_asset_token(head).await,
                Probe::AppStatic => self.probe_app_static(head).await,
                Probe::TransportMounts => self.probe_mounts(head).await,
            };

            if let RouteDecision::Handled(mut response) = decision {
                merge_headers(&mut response, &extra_headers);
                metrics::record_request(probe.label(), response.status().as_u16());
                return response;
            }
        }

        let mut response = self.not_found_response().await;
        merge_headers(&mut response, &extra_headers);
        metrics::record_request("fallback", response.status().as_u16());
        response
    }

    /// The single terminal not-found response: 404, text/html, rewritten page.
    pub async fn not_found_response(&self) -> GatewayResponse {
        let body = self.pipeline.not_found_page().await;
        respond(StatusCode::NOT_FOUND, Some("text/html"), body)
    }

    /// Probe 2: passthrough CDN fetch.
    ///
    /// Only "not under the CDN prefix" and upstream non-200 continue the
    /// chain; a network failure is terminal.
    async fn probe_cdn(&self, head: &Parts) -> RouteDecision {
        let path = head.uri.path();
        if !path.starts_with(&self.cdn_prefix) {
            return RouteDecision::Continue;
        }

        match self.proxy.fetch_and_rewrite(path).await {
            CdnOutcome::Served { content_type, body } => RouteDecision::Handled(respond(
                StatusCode::OK,
                content_type.as_deref(),
                body,
            )),
            CdnOutcome::Fallthrough => RouteDecision::Continue,
            CdnOutcome::Failed => RouteDecision::Handled(self.not_found_response().await),
        }
    }

    /// Probe 3: allow-listed service-worker scripts get a widened scope
    /// header attached to whatever response the rest of the chain picks.
    fn probe_service_worker(&self, head: &Parts, extra: &mut HeaderMap) -> RouteDecision {
        if self
            .sw_allowed_paths
            .iter()
            .any(|allowed| allowed == head.uri.path())
        {
            extra.insert(SERVICE_WORKER_ALLOWED, HeaderValue::from_static("/"));
        }
        RouteDecision::Continue
    }

    /// Probe 4: direct asset addressing via `GET /asset?asset=<path>`.
    async fn probe_asset_query(&self, head: &Parts) -> RouteDecision {
        if head.uri.path() != "/asset" {
            return RouteDecision::Continue;
        }
        let Some(logical) = asset_query_param(head) else {
            return RouteDecision::Continue;
        };

        let Some(file) = resolve(&logical, &self.assets_root) else {
            return RouteDecision::Continue;
        };

        // Defense in depth: re-validate containment even though the
        // resolver already guarantees it.
        if !file.starts_with(&self.assets_root) {
            tracing::warn!(path = %file.display(), "Resolved asset escaped assets root");
            return RouteDecision::Continue;
        }

        match tokio::fs::read(&file).await {
            Ok(raw) => RouteDecision::Handled(respond(
                StatusCode::OK,
                Some(&guess_content_type(&file)),
                Bytes::from(raw),
            )),
            Err(_) => RouteDecision::Continue,
        }
    }

    /// Probe 5: token-gated asset delivery via `GET /asset/<token>`.
    async fn probe_asset_token(&self, head: &Parts) -> RouteDecision {
        let path = head.uri.path();
        let Some(token) = path.strip_prefix("/asset/") else {
            return RouteDecision::Continue;
        };
        if token.is_empty() || token.contains('/') || asset_query_param(head).is_some() {
            return RouteDecision::Continue;
        }

        // Atomic check-and-delete: the losing side of a race lands here
        // with None and falls through like any invalid id.
        let Some(payload) = self.tokens.consume(token) else {
            return RouteDecision::Continue;
        };

        match payload {
            TokenPayload::Asset(descriptor) => {
                let class = ContentClass::from_content_type(&descriptor.content_type);
                let origin = origin_path(&descriptor.source_path, &self.static_root);

                match self
                    .pipeline
                    .rewrite_file(&descriptor.source_path, class, &origin)
                    .await
                {
                    Ok(body) => RouteDecision::Handled(respond(
                        StatusCode::OK,
                        Some(&descriptor.content_type),
                        body,
                    )),
                    Err(error) => {
                        tracing::warn!(
                            asset = %descriptor.source_path.display(),
                            %error,
                            "Token-gated asset delivery failed"
                        );
                        RouteDecision::Handled(self.not_found_response().await)
                    }
                }
            }
        }
    }

    /// Probe 6: application shell static files with URL canonicalization.
    async fn probe_app_static(&self, head: &Parts) -> RouteDecision {
        let path = head.uri.path();

        if path == "/index" {
            return RouteDecision::Handled(redirect("/"));
        }

        let Some(file) = resolve(path, &self.static_root) else {
            return RouteDecision::Continue;
        };

        // Clients never observe .html URLs.
        if let Some(stripped) = path.strip_suffix(".html") {
            let target = if stripped.is_empty() { "/" } else { stripped };
            return RouteDecision::Handled(redirect(target));
        }

        let class = ContentClass::from_path(&file);
        match class {
            ContentClass::Other => match tokio::fs::read(&file).await {
                Ok(raw) => RouteDecision::Handled(respond(
                    StatusCode::OK,
                    Some(&guess_content_type(&file)),
                    Bytes::from(raw),
                )),
                Err(_) => RouteDecision::Handled(self.not_found_response().await),
            },
            _ => match self.pipeline.rewrite_file(&file, class, path).await {
                Ok(body) => {
                    RouteDecision::Handled(respond(StatusCode::OK, class.content_type(), body))
                }
                Err(error) => {
                    tracing::warn!(file = %file.display(), %error, "Static rewrite failed");
                    RouteDecision::Handled(self.not_found_response().await)
                }
            },
        }
    }

    /// Probe 7: transport library asset bundles at fixed prefixes.
    async fn probe_mounts(&self, head: &Parts) -> RouteDecision {
        let path = head.uri.path();

        for mount in &self.mounts {
            let Some(remainder) = path.strip_prefix(&mount.prefix) else {
                continue;
            };
            let Some(file) = resolve(remainder, &mount.root) else {
                continue;
            };

            let content_type = if file
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&mount.forced_script_ext))
            {
                // Library-required override for its module format.
                "text/javascript".to_string()
            } else {
                guess_content_type(&file)
            };

            match tokio::fs::read(&file).await {
                Ok(raw) => {
                    return RouteDecision::Handled(respond(
                        StatusCode::OK,
                        Some(&content_type),
                        Bytes::from(raw),
                    ))
                }
                Err(_) => continue,
            }
        }

        RouteDecision::Continue
    }
}

/// Extract the `asset` query parameter.
fn asset_query_param(head: &Parts) -> Option<String> {
    let query = head.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "asset")
        .map(|(_, value)| value.into_owned())
}

/// Logical origin path of a gated asset, relative to the static root.
fn origin_path(source: &Path, static_root: &Path) -> String {
    match source.strip_prefix(static_root) {
        Ok(relative) => format!("/{}", relative.to_string_lossy()),
        Err(_) => source.to_string_lossy().into_owned(),
    }
}

fn respond(status: StatusCode, content_type: Option<&str>, body: Bytes) -> GatewayResponse {
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    finish(builder.body(Full::new(body)))
}

fn redirect(location: &str) -> GatewayResponse {
    finish(
        Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location)
            .body(Full::new(Bytes::new())),
    )
}

/// A response builder only fails on malformed header values; degrade to
/// a bare 500 rather than panic on a hostile path.
fn finish(result: Result<GatewayResponse, hyper::http::Error>) -> GatewayResponse {
    result.unwrap_or_else(|error| {
        tracing::error!(%error, "Failed to build response");
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

fn merge_headers(response: &mut GatewayResponse, extra: &HeaderMap) {
    for (name, value) in extra {
        response.headers_mut().insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OriginRuleConfig;
    use crate::rewrite::IdentityRewriter;
    use crate::tokens::AssetDescriptor;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dispatcher: Dispatcher,
        _static_dir: TempDir,
        _pages_dir: TempDir,
        _mount_dir: TempDir,
        assets_root: PathBuf,
    }

    fn fixture() -> Fixture {
        fixture_with(|_| {})
    }

    fn fixture_with(adjust: impl FnOnce(&mut GatewayConfig)) -> Fixture {
        let static_dir = tempfile::tempdir().unwrap();
        let pages_dir = tempfile::tempdir().unwrap();
        let mount_dir = tempfile::tempdir().unwrap();

        fs::write(static_dir.path().join("index.html"), "<html>home</html>").unwrap();
        fs::write(static_dir.path().join("foo.html"), "<html>foo</html>").unwrap();
        fs::write(static_dir.path().join("logo.png"), [137u8, 80, 78, 71]).unwrap();
        fs::create_dir(static_dir.path().join("assets")).unwrap();
        fs::write(static_dir.path().join("assets/style.css"), "body{}").unwrap();
        fs::write(pages_dir.path().join("404.html"), "<html>lost</html>").unwrap();
        fs::write(mount_dir.path().join("bundle.cjs"), "module.exports=1").unwrap();
        fs::write(mount_dir.path().join("sw.js"), "onfetch=1").unwrap();

        let mut config = GatewayConfig::default();
        config.content.static_root = static_dir.path().to_path_buf();
        config.content.assets_root = static_dir.path().join("assets");
        config.content.pages_root = pages_dir.path().to_path_buf();
        config.cdn.rules = Vec::new();
        config.mounts = vec![MountConfig {
            prefix: "/uv/".to_string(),
            root: mount_dir.path().to_path_buf(),
            forced_script_ext: ".cjs".to_string(),
        }];
        adjust(&mut config);

        let tokens = TokenStore::new(&config.tokens);
        let pipeline = RewritePipeline::new(
            Arc::new(IdentityRewriter),
            &config.content.pages_root,
        );
        let proxy = Arc::new(PassthroughProxy::new(&config.cdn).unwrap());
        let assets_root = config.content.assets_root.canonicalize().unwrap();
        let dispatcher = Dispatcher::new(&config, tokens, pipeline, proxy);

        Fixture {
            dispatcher,
            _static_dir: static_dir,
            _pages_dir: pages_dir,
            _mount_dir: mount_dir,
            assets_root,
        }
    }

    fn head(uri: &str) -> Parts {
        let (parts, _) = hyper::Request::builder()
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    async fn collect(response: GatewayResponse) -> (StatusCode, HeaderMap, Bytes) {
        use http_body_util::BodyExt;
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        (parts.status, parts.headers, bytes)
    }

    #[tokio::test]
    async fn index_redirects_to_root() {
        let fx = fixture();
        let (status, headers, _) = collect(fx.dispatcher.dispatch(&head("/index")).await).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/");
    }

    #[tokio::test]
    async fn html_suffix_is_canonicalized_away() {
        let fx = fixture();
        let (status, headers, _) = collect(fx.dispatcher.dispatch(&head("/foo.html")).await).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/foo");
    }

    #[tokio::test]
    async fn extensionless_page_is_served_as_html() {
        let fx = fixture();
        let (status, headers, body) = collect(fx.dispatcher.dispatch(&head("/foo")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(&body[..], b"<html>foo</html>");
    }

    #[tokio::test]
    async fn binary_static_file_streams_raw() {
        let fx = fixture();
        let (status, headers, body) = collect(fx.dispatcher.dispatch(&head("/logo.png")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(&body[..], &[137u8, 80, 78, 71]);
    }

    #[tokio::test]
    async fn unmatched_path_gets_rewritten_not_found_page() {
        let fx = fixture();
        let (status, headers, body) = collect(fx.dispatcher.dispatch(&head("/nope")).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(&body[..], b"<html>lost</html>");
    }

    #[tokio::test]
    async fn token_gated_asset_is_delivered_exactly_once() {
        let fx = fixture();
        let id = fx.dispatcher.tokens().issue(TokenPayload::Asset(AssetDescriptor {
            content_type: "text/css".to_string(),
            source_path: fx.assets_root.join("style.css"),
        }));

        let uri = format!("/asset/{id}");
        let (status, headers, body) = collect(fx.dispatcher.dispatch(&head(&uri)).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/css");
        assert_eq!(&body[..], b"body{}");

        // Second presentation of the same token is an ordinary 404.
        let (status, _, body) = collect(fx.dispatcher.dispatch(&head(&uri)).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(&body[..], b"<html>lost</html>");
    }

    #[tokio::test]
    async fn invalid_token_falls_through_to_not_found() {
        let fx = fixture();
        let (status, _, _) =
            collect(fx.dispatcher.dispatch(&head("/asset/deadbeef")).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn asset_query_serves_from_assets_root() {
        let fx = fixture();
        let (status, headers, body) =
            collect(fx.dispatcher.dispatch(&head("/asset?asset=style.css")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/css");
        assert_eq!(&body[..], b"body{}");
    }

    #[tokio::test]
    async fn asset_query_traversal_is_plain_not_found() {
        let fx = fixture();
        // index.html exists one level above the assets root.
        let (status, _, _) = collect(
            fx.dispatcher
                .dispatch(&head("/asset?asset=../index.html"))
                .await,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn asset_query_takes_precedence_over_token_probe() {
        let fx = fixture();
        // A token-shaped path with an asset query param never consumes.
        let id = fx.dispatcher.tokens().issue(TokenPayload::Asset(AssetDescriptor {
            content_type: "text/css".to_string(),
            source_path: fx.assets_root.join("style.css"),
        }));

        let uri = format!("/asset/{id}?asset=style.css");
        let _ = collect(fx.dispatcher.dispatch(&head(&uri)).await).await;
        assert!(fx.dispatcher.tokens().exists(&id));
    }

    #[tokio::test]
    async fn mount_serves_forced_script_type() {
        let fx = fixture();
        let (status, headers, body) =
            collect(fx.dispatcher.dispatch(&head("/uv/bundle.cjs")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/javascript");
        assert_eq!(&body[..], b"module.exports=1");
    }

    #[tokio::test]
    async fn service_worker_header_attaches_without_short_circuit() {
        let fx = fixture_with(|config| {
            config.service_worker.allowed_paths = vec!["/uv/sw.js".to_string()];
        });

        let (status, headers, _) =
            collect(fx.dispatcher.dispatch(&head("/uv/sw.js")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("service-worker-allowed").unwrap(), "/");
    }

    #[tokio::test]
    async fn cdn_path_without_rules_falls_through() {
        let fx = fixture();
        let (status, _, _) = collect(fx.dispatcher.dispatch(&head("/cdn/game.js")).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cdn_network_failure_is_terminal_not_found() {
        let fx = fixture_with(|config| {
            config.cdn.rules = vec![OriginRuleConfig {
                prefix: "/cdn/".to_string(),
                // Nothing listens on port 9; connect fails immediately.
                origin: "http://127.0.0.1:9/".to_string(),
            }];
            config.cdn.timeout_secs = 2;
        });

        let (status, headers, body) =
            collect(fx.dispatcher.dispatch(&head("/cdn/game.js")).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(&body[..], b"<html>lost</html>");
    }

    #[test]
    fn origin_path_is_relative_to_static_root() {
        let root = PathBuf::from("/srv/static");
        assert_eq!(
            origin_path(&root.join("games/a.html"), &root),
            "/games/a.html"
        );
    }
}
