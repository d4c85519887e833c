//! Device-aware asset selection and template caching.
//!
//! Requests are classified by user agent into a [`Fingerprint`]; the site's
//! asset manifest is filtered down to that device class once and memoised in
//! the [`ModuleCache`]; page templates are compiled once by the
//! [`TemplateCompiler`] and rendered with the filtered manifest.
//!
//! [`Fingerprint`]: agent::Fingerprint
//! [`ModuleCache`]: cache::ModuleCache
//! [`TemplateCompiler`]: site::TemplateCompiler

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod manifest;
pub mod metrics;
pub mod site;

use std::sync::Arc;

use anyhow::Result;
use prometheus_client::metrics::counter::Counter;
use tracing::info;

use crate::agent::Classifier;
use crate::cache::ModuleCache;
use crate::config::Config;
use crate::error::AssetError;
use crate::manifest::ManifestSet;
use crate::metrics::MetricsRegistry;
use crate::site::{ErrorReporter, TemplateCompiler, TracingReporter};

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub classifier: Arc<Classifier>,
    pub manifests: Arc<ManifestSet>,
    pub modules: Arc<ModuleCache>,
    pub templates: Arc<TemplateCompiler>,
    pub metrics: MetricsRegistry,
}

impl AppState {
    /// Load the configured manifests, optionally pre-load the site's files,
    /// and wire up the caches.
    pub async fn build(config: Arc<Config>) -> Result<Self> {
        let mut manifests = ManifestSet::load(&config.site)?;
        let templates = TemplateCompiler::from_config(&config.site);
        let metrics = MetricsRegistry::new();

        if config.site.compile_on_start {
            let reporter = CountingReporter {
                failures: &metrics.metrics.site_load_failures,
            };
            for (namespace, manifest) in manifests.manifests_mut() {
                templates.compile_site(manifest, &reporter).await;
                info!(?namespace, "site files loaded");
            }
        }

        Ok(Self {
            modules: Arc::new(ModuleCache::new(config.cache)),
            classifier: Arc::new(Classifier::default()),
            manifests: Arc::new(manifests),
            templates: Arc::new(templates),
            metrics,
            config,
        })
    }
}

/// Logs failures and counts them in the site-load metric.
struct CountingReporter<'a> {
    failures: &'a Counter,
}

impl ErrorReporter for CountingReporter<'_> {
    fn report(&self, err: &AssetError) {
        TracingReporter.report(err);
        self.failures.inc();
    }
}
