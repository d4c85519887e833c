use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::cache;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ModuleLabels {
    pub partition: PartitionKind,
    pub cache_status: CacheStatus,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum PartitionKind {
    Default,
    Namespaced,
}

impl PartitionKind {
    pub fn of(namespace: Option<&str>) -> Self {
        match namespace {
            Some(_) => PartitionKind::Namespaced,
            None => PartitionKind::Default,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl From<cache::CacheStatus> for CacheStatus {
    fn from(status: cache::CacheStatus) -> Self {
        match status {
            cache::CacheStatus::Hit => CacheStatus::Hit,
            cache::CacheStatus::Miss => CacheStatus::Miss,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResponseLabels {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Every Prometheus metric exposed by the service.
pub struct Metrics {
    // -- module cache --
    pub module_lookups: Family<ModuleLabels, Counter>,
    pub module_cache_entries: Gauge,

    // -- templates --
    pub template_fallbacks: Counter,
    pub site_load_failures: Counter,

    // -- pages --
    pub page_responses: Family<ResponseLabels, Counter>,
    pub page_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let module_lookups = Family::<ModuleLabels, Counter>::default();
        registry.register(
            "assetcache_module_lookups",
            "Module cache lookups by partition kind and result",
            module_lookups.clone(),
        );

        let module_cache_entries: Gauge = Gauge::default();
        registry.register(
            "assetcache_module_cache_entries",
            "Filtered manifests currently cached",
            module_cache_entries.clone(),
        );

        let template_fallbacks = Counter::default();
        registry.register(
            "assetcache_template_fallbacks",
            "Requests served the not-found page instead of the requested page",
            template_fallbacks.clone(),
        );

        let site_load_failures = Counter::default();
        registry.register(
            "assetcache_site_load_failures",
            "Page or partial files that failed to load during site compilation",
            site_load_failures.clone(),
        );

        let page_responses = Family::<ResponseLabels, Counter>::default();
        registry.register(
            "assetcache_page_responses",
            "Page responses by HTTP status",
            page_responses.clone(),
        );

        let page_duration_seconds = Histogram::new(exponential_buckets(0.0005, 2.0, 14));
        registry.register(
            "assetcache_page_duration_seconds",
            "Page handling latency in seconds",
            page_duration_seconds.clone(),
        );

        Self {
            module_lookups,
            module_cache_entries,
            template_fallbacks,
            site_load_failures,
            page_responses,
            page_duration_seconds,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in [`AppState`].
///
/// [`AppState`]: crate::AppState
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Encode the registry in OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
