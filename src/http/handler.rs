//! Main axum router and HTTP request handlers.
//!
//! Routes:
//! - `GET /`         - The configured index page
//! - `GET /{*page}`  - Any other page, by logical path
//! - `GET /healthz`  - Health check
//! - `GET /metrics`  - Prometheus metrics

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::agent::Classification;
use crate::error::AssetError;
use crate::manifest::AssetManifest;
use crate::metrics::{ModuleLabels, PartitionKind, ResponseLabels};
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/healthz", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/{*page}", get(handle_page))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Template context
// ---------------------------------------------------------------------------

/// Data a page template renders with: the filtered manifest's fields at the
/// top level plus the request's classification under `agent`.  Manifests
/// cannot define `agent` themselves (see [`load_manifest`]).
///
/// [`load_manifest`]: crate::manifest::load_manifest
#[derive(Serialize)]
struct PageContext<'a> {
    #[serde(flatten)]
    module: &'a AssetManifest,
    agent: &'a Classification,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /`
async fn handle_index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let page = state.config.site.index_page.clone();
    serve(&state, &page, &query, &headers).await
}

/// `GET /{*page}`
async fn handle_page(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let logical_path = format!("/{page}");
    serve(&state, &logical_path, &query, &headers).await
}

/// `GET /healthz`
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    crate::health::health_report(&state)
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the service.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    state.metrics.metrics.module_cache_entries.set(state.modules.stats().entries as i64);

    let buf = state
        .metrics
        .encode()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Page serving
// ---------------------------------------------------------------------------

/// Render one page and record its outcome.
async fn serve(
    state: &AppState,
    logical_path: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Response {
    let started = Instant::now();
    let response = match render_page(state, logical_path, query, headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };

    let metrics = &state.metrics.metrics;
    metrics
        .page_responses
        .get_or_create(&ResponseLabels {
            status: response.status().as_u16().to_string(),
        })
        .inc();
    metrics
        .page_duration_seconds
        .observe(started.elapsed().as_secs_f64());

    response
}

/// Classify the request, fetch the module for its device class and render
/// the page template with it.
#[instrument(skip(state, query, headers), fields(page = %logical_path))]
async fn render_page(
    state: &AppState,
    logical_path: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let forced = query
        .get(&state.config.agent.override_param)
        .map(String::as_str);

    let classification = state.classifier.classify(user_agent, forced);
    let (namespace, manifest) = state.manifests.for_page(logical_path);
    let (module, cache_status) = state.modules.get_or_insert(&classification, namespace, manifest);

    state
        .metrics
        .metrics
        .module_lookups
        .get_or_create(&ModuleLabels {
            partition: PartitionKind::of(namespace),
            cache_status: cache_status.into(),
        })
        .inc();
    debug!(fingerprint = %classification.fingerprint, ?namespace, ?cache_status, "module selected");

    let page = state
        .templates
        .compile_template(module, logical_path, StatusCode::OK)
        .await?;
    if page.status == StatusCode::NOT_FOUND {
        state.metrics.metrics.template_fallbacks.inc();
    }

    let body = state.templates.render(
        &page,
        &PageContext {
            module: &page.manifest,
            agent: &classification,
        },
    )?;

    Ok((page.status, Html(body)).into_response())
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Unified error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Neither the page nor the not-found page exists.
    NotFound(String),
    /// An unexpected internal error.
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Internal(err) => {
                error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {err:#}"),
                )
                    .into_response()
            }
        }
    }
}

impl From<AssetError> for AppError {
    fn from(err: AssetError) -> Self {
        if err.is_not_found() {
            AppError::NotFound(err.to_string())
        } else {
            AppError::Internal(err.into())
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path as FsPath;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::parse_config;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

    fn site(with_not_found: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir(&public).unwrap();
        std::fs::write(
            public.join("index.html"),
            "{{title}}:{{#each scripts}}[{{this}}]{{/each}}",
        )
        .unwrap();
        std::fs::write(public.join("about.html"), "about {{title}}").unwrap();
        if with_not_found {
            std::fs::write(public.join("404.html"), "nope {{title}}").unwrap();
        }
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{"title": "Home", "scripts": ["base.js", {"name": "ios.js", "agents": ["ios"]}]}"#,
        )
        .unwrap();
        dir
    }

    async fn app(root: &FsPath) -> (Router, Arc<AppState>) {
        let yaml = format!(
            "site:\n  public_dirs: [\"{}\"]\n  manifests: [\"{}\"]\n",
            root.join("public").display(),
            root.join("manifest.json").display(),
        );
        let config = parse_config(&yaml).unwrap();
        let state = Arc::new(AppState::build(Arc::new(config)).await.unwrap());
        (create_router(Arc::clone(&state)), state)
    }

    async fn get(app: &Router, uri: &str, user_agent: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::USER_AGENT, user_agent)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_renders_module_for_device() {
        let dir = site(true);
        let (app, state) = app(dir.path()).await;

        let (status, body) = get(&app, "/", IPHONE).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Home:[base.js][ios.js]");

        let (status, body) = get(&app, "/", DESKTOP).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Home:[base.js]");

        assert_eq!(state.modules.stats().entries, 2);
    }

    #[tokio::test]
    async fn repeated_requests_hit_the_module_cache() {
        let dir = site(true);
        let (app, state) = app(dir.path()).await;

        get(&app, "/", IPHONE).await;
        get(&app, "/index.html", IPHONE).await;
        assert_eq!(state.modules.stats().entries, 1);
    }

    #[tokio::test]
    async fn override_parameter_adds_class() {
        let dir = site(true);
        let (app, _) = app(dir.path()).await;

        let (status, body) = get(&app, "/?agent=iOS", DESKTOP).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Home:[base.js][ios.js]");
    }

    #[tokio::test]
    async fn other_pages_are_served_by_path() {
        let dir = site(true);
        let (app, _) = app(dir.path()).await;

        let (status, body) = get(&app, "/about.html", DESKTOP).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "about Home");
    }

    #[tokio::test]
    async fn missing_page_renders_not_found_page() {
        let dir = site(true);
        let (app, _) = app(dir.path()).await;

        let (status, body) = get(&app, "/missing.html", DESKTOP).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "nope Home");
    }

    #[tokio::test]
    async fn missing_not_found_page_is_plain_404() {
        let dir = site(false);
        let (app, _) = app(dir.path()).await;

        let (status, body) = get(&app, "/missing.html", DESKTOP).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("/404.html"));
    }

    #[tokio::test]
    async fn traversal_is_not_served() {
        let dir = site(false);
        let (app, _) = app(dir.path()).await;

        let (status, _) = get(&app, "/../manifest.json", DESKTOP).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn namespaced_page_uses_its_manifest_and_custom_override() {
        let dir = site(true);
        let root = dir.path();
        std::fs::write(
            root.join("public").join("checkout.html"),
            "{{#each scripts}}[{{this}}]{{/each}}|{{agent.fingerprint}}",
        )
        .unwrap();
        std::fs::write(
            root.join("checkout.json"),
            r#"{"scripts": ["pay.js", {"name": "pay-ios.js", "agents": ["iOS"]}]}"#,
        )
        .unwrap();

        let yaml = format!(
            "site:\n  public_dirs: [\"{public}\"]\n  manifests: [\"{base}\"]\n  namespaces:\n    checkout:\n      pages: [/checkout.html]\n      manifests: [\"{checkout}\"]\nagent:\n  override_param: device\n",
            public = root.join("public").display(),
            base = root.join("manifest.json").display(),
            checkout = root.join("checkout.json").display(),
        );
        let config = parse_config(&yaml).unwrap();
        let state = Arc::new(AppState::build(Arc::new(config)).await.unwrap());
        let app = create_router(Arc::clone(&state));

        let (status, body) = get(&app, "/checkout.html", "curl/8.4.0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[base.js][pay.js]|000000000000");

        let (status, body) = get(&app, "/checkout.html?device=iOS", "curl/8.4.0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[base.js][ios.js][pay.js][pay-ios.js]|001000000000");

        // The default parameter name no longer applies.
        let (_, body) = get(&app, "/checkout.html?agent=iOS", "curl/8.4.0").await;
        assert_eq!(body, "[base.js][pay.js]|000000000000");

        let stats = state.modules.stats();
        assert_eq!(stats.partitions, 1);
        assert_eq!(stats.entries, 2);
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let dir = site(true);
        let (app, _) = app(dir.path()).await;

        let (status, body) = get(&app, "/healthz", DESKTOP).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn healthz_degraded_without_not_found_page() {
        let dir = site(false);
        let (app, _) = app(dir.path()).await;

        let (status, body) = get(&app, "/healthz", DESKTOP).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "degraded");
    }

    #[tokio::test]
    async fn metrics_count_lookups_and_responses() {
        let dir = site(true);
        let (app, _) = app(dir.path()).await;

        get(&app, "/", IPHONE).await;
        get(&app, "/missing.html", IPHONE).await;

        let (status, body) = get(&app, "/metrics", DESKTOP).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("assetcache_module_lookups"));
        assert!(body.contains("cache_status=\"Hit\""));
        assert!(body.contains("status=\"404\""));
        assert!(body.contains("assetcache_template_fallbacks"));
    }
}
