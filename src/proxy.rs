//! Local data proxy: CLI-backed JSON routes plus the built front-end.
//!
//! `/api/sessions`, `/api/cron` and `/api/status` shell out to the OpenClaw
//! CLI through a [`CommandRunner`] and cache each result for [`DEFAULT_TTL`].
//! Everything that is not an API route is served from the build output
//! directory, falling back to `index.html` for client-side routing.
//!
//! [`DEFAULT_TTL`]: crate::cache::DEFAULT_TTL

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use chrono::Utc;
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::cache::TtlCache;
use crate::cli::CommandRunner;
use crate::error::ExecutionError;
use crate::models::Resource;

/// Shared state for the proxy routes. Owns the response cache.
#[derive(Clone)]
pub struct ProxyState {
    cache: TtlCache<Value>,
    cli: Arc<dyn CommandRunner>,
    dist_dir: PathBuf,
}

impl ProxyState {
    pub fn new(cli: Arc<dyn CommandRunner>, dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache: TtlCache::new(),
            cli,
            dist_dir: dist_dir.into(),
        }
    }

    pub fn dist_dir(&self) -> &Path {
        &self.dist_dir
    }

    /// Release cached responses when the server stops.
    pub async fn dispose(&self) {
        debug!(
            "Dropping {} cached responses (ttl {:?})",
            self.cache.len().await,
            self.cache.ttl()
        );
        self.cache.dispose().await;
    }

    /// Cached CLI output for `resource`, running the CLI on a miss.
    ///
    /// Failures are not cached. Two concurrent misses both run the CLI.
    pub async fn fetch_resource(&self, resource: Resource) -> Result<Value, ExecutionError> {
        let key = resource.cache_key();
        if let Some(cached) = self.cache.get(key).await {
            debug!("Cache hit for {}", key);
            return Ok(cached);
        }

        let value = self.cli.run(resource.cli_args()).await?;
        self.cache.set(key, value.clone()).await;
        Ok(value)
    }
}

/// Build the proxy router.
///
/// API routes answer on their path whatever the method; OPTIONS is taken by
/// the preflight layer first.
pub fn router(state: ProxyState) -> Router {
    let api = Router::new()
        .route("/api/sessions", any(sessions_handler))
        .route("/api/cron", any(cron_handler))
        .route("/api/status", any(status_handler))
        .route("/api/health", any(health_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ));

    Router::new()
        .merge(api)
        .fallback(static_handler)
        .layer(middleware::from_fn(preflight))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

const ALLOW_METHODS: &str = "GET, OPTIONS";

/// Answer every `OPTIONS` request before routing.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            ],
        )
            .into_response();
    }
    next.run(request).await
}

async fn sessions_handler(State(state): State<ProxyState>) -> Response {
    resource_response(&state, Resource::Sessions).await
}

async fn cron_handler(State(state): State<ProxyState>) -> Response {
    resource_response(&state, Resource::Cron).await
}

async fn status_handler(State(state): State<ProxyState>) -> Response {
    resource_response(&state, Resource::Status).await
}

async fn resource_response(state: &ProxyState, resource: Resource) -> Response {
    match state.fetch_resource(resource).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().timestamp_millis(),
    }))
}

// -----------------------------------------------------------------------------
// Static files
// -----------------------------------------------------------------------------

/// Content type for a file name, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Map a request path onto a file below `root`.
///
/// Returns `None` for anything that could escape the root (`..`, absolute
/// segments, invalid UTF-8 after decoding).
fn resolve_static_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
    let relative = decoded.trim_start_matches('/');
    let relative = if relative.is_empty() {
        "index.html"
    } else {
        relative
    };

    let relative = Path::new(relative);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

async fn read_file(path: &Path) -> Option<Vec<u8>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    tokio::fs::read(path).await.ok()
}

async fn static_handler(State(state): State<ProxyState>, uri: Uri) -> Response {
    if let Some(path) = resolve_static_path(&state.dist_dir, uri.path()) {
        if let Some(body) = read_file(&path).await {
            return ([(header::CONTENT_TYPE, content_type_for(&path))], body).into_response();
        }
    }

    // SPA fallback
    let index = state.dist_dir.join("index.html");
    match read_file(&index).await {
        Some(body) => ([(header::CONTENT_TYPE, "text/html")], body).into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct FakeRunner {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    impl FakeRunner {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, args: &[&str]) -> Result<Value, ExecutionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen
                .lock()
                .unwrap()
                .push(args.iter().map(|a| a.to_string()).collect());
            if self.fail {
                return Err(ExecutionError::Timeout {
                    command: format!("openclaw {} --json", args.join(" ")),
                    timeout: Duration::from_secs(30),
                });
            }
            Ok(json!({ "call": n, "args": args }))
        }
    }

    fn app(runner: Arc<FakeRunner>, dist: &Path) -> Router {
        router(ProxyState::new(runner, dist))
    }

    async fn send(app: &Router, method: Method, uri: &str) -> Response {
        app.clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_bypasses_cli() {
        let runner = Arc::new(FakeRunner::failing());
        let dir = tempfile::tempdir().unwrap();
        let app = app(runner.clone(), dir.path());

        let response = send(&app, Method::GET, "/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_i64());
        assert_eq!(runner.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_request_within_ttl_hits_cache() {
        let runner = Arc::new(FakeRunner::default());
        let dir = tempfile::tempdir().unwrap();
        let app = app(runner.clone(), dir.path());

        let first = body_json(send(&app, Method::GET, "/api/sessions").await).await;
        let second = body_json(send(&app, Method::GET, "/api/sessions").await).await;

        assert_eq!(runner.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first["args"], json!(["sessions"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cli_rerun_after_ttl() {
        let runner = Arc::new(FakeRunner::default());
        let state = ProxyState::new(runner.clone(), "dist");

        state.fetch_resource(Resource::Status).await.unwrap();
        tokio::time::advance(Duration::from_millis(4999)).await;
        state.fetch_resource(Resource::Status).await.unwrap();
        assert_eq!(runner.calls(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        let fresh = state.fetch_resource(Resource::Status).await.unwrap();
        assert_eq!(runner.calls(), 2);
        assert_eq!(fresh["call"], 2);
    }

    #[tokio::test]
    async fn test_resources_use_their_own_subcommands() {
        let runner = Arc::new(FakeRunner::default());
        let state = ProxyState::new(runner.clone(), "dist");

        for resource in Resource::ALL {
            state.fetch_resource(resource).await.unwrap();
        }

        let seen = runner.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                vec!["sessions".to_string()],
                vec!["cron".to_string(), "list".to_string()],
                vec!["status".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_api_routes_ignore_method() {
        let runner = Arc::new(FakeRunner::default());
        let dir = tempfile::tempdir().unwrap();
        let app = app(runner.clone(), dir.path());

        let response = send(&app, Method::POST, "/api/cron").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["args"], json!(["cron", "list"]));

        let response = send(&app, Method::PUT, "/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_cli_failure_is_500_and_not_cached() {
        let runner = Arc::new(FakeRunner::failing());
        let dir = tempfile::tempdir().unwrap();
        let app = app(runner.clone(), dir.path());

        let response = send(&app, Method::GET, "/api/cron").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("timed out"));

        send(&app, Method::GET, "/api/cron").await;
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_options_is_no_content_with_cors() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(Arc::new(FakeRunner::default()), dir.path());

        for uri in ["/api/sessions", "/anything/else"] {
            let response = send(&app, Method::OPTIONS, uri).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert_eq!(
                response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
                "*"
            );
            assert_eq!(
                response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
                "GET, OPTIONS"
            );
            assert!(body_text(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_static_files_and_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>app</html>").unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets").join("app.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join("data.bin"), [0u8, 1, 2]).unwrap();
        let app = app(Arc::new(FakeRunner::default()), dir.path());

        let response = send(&app, Method::GET, "/assets/app.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript"
        );
        assert_eq!(body_text(response).await, "console.log(1)");

        let response = send(&app, Method::GET, "/data.bin").await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );

        for uri in ["/", "/sessions/agent:main:main", "/assets", "/api/unknown"] {
            let response = send(&app, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
            assert_eq!(body_text(response).await, "<html>app</html>");
        }
    }

    #[tokio::test]
    async fn test_traversal_never_leaves_dist() {
        let outer = tempfile::tempdir().unwrap();
        let dist = outer.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "top secret").unwrap();
        let app = app(Arc::new(FakeRunner::default()), &dist);

        let response = send(&app, Method::GET, "/%2e%2e/secret.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not found");
    }

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type_for(Path::new("a/index.html")), "text/html");
        assert_eq!(content_type_for(Path::new("style.css")), "text/css");
        assert_eq!(content_type_for(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type_for(Path::new("favicon.ico")), "image/x-icon");
        assert_eq!(content_type_for(Path::new("font.woff2")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
    }
}
