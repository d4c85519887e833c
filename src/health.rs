use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
    pub module_cache: CacheStats,
    /// Raw site files held in memory.
    pub cached_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub public_dirs: CheckResult,
    pub not_found_page: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

/// Every configured public directory must exist.  Returns the check and
/// whether at least one directory is usable.
fn check_public_dirs(state: &AppState) -> (CheckResult, bool) {
    let dirs = &state.config.site.public_dirs;
    let missing: Vec<String> = dirs
        .iter()
        .filter(|dir| !dir.is_dir())
        .map(|dir| dir.display().to_string())
        .collect();

    let any_usable = missing.len() < dirs.len();
    if missing.is_empty() {
        (CheckResult::healthy(), any_usable)
    } else {
        (
            CheckResult::unhealthy(format!("missing: {}", missing.join(", "))),
            any_usable,
        )
    }
}

fn check_not_found_page(state: &AppState) -> CheckResult {
    let page = &state.config.site.not_found_page;
    match crate::site::resolve(&state.config.site.public_dirs, page) {
        Ok(_) => CheckResult::healthy(),
        Err(e) => CheckResult::unhealthy(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

fn aggregate_status(checks: &HealthChecks, any_dir_usable: bool) -> HealthStatus {
    if checks.public_dirs.ok && checks.not_found_page.ok {
        HealthStatus::Ok
    } else if !any_dir_usable {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    }
}

// ---------------------------------------------------------------------------
// Handler body
// ---------------------------------------------------------------------------

/// `GET /healthz` response.  200 on Ok/Degraded, 503 on Unhealthy.
pub fn health_report(state: &AppState) -> (StatusCode, Json<HealthResponse>) {
    let (public_dirs, any_dir_usable) = check_public_dirs(state);
    let checks = HealthChecks {
        public_dirs,
        not_found_page: check_not_found_page(state),
    };
    let status = aggregate_status(&checks, any_dir_usable);

    let http_status = match status {
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            checks,
            module_cache: state.modules.stats(),
            cached_files: state.templates.loader().cached_files(),
        }),
    )
}
