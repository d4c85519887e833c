//! Page template compilation and whole-site loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use futures::future::{join, join_all};
use handlebars::{Handlebars, Template};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::loader::{FileSource, SiteLoader};
use super::locate::resolve_async;
use super::report::ErrorReporter;
use crate::config::SiteConfig;
use crate::error::AssetError;
use crate::manifest::{AssetManifest, COMPILE_SITE, HTML_FILES, PUBLIC, TEMPLATE_FILES};

/// A page ready to render: the module it was compiled for, the compiled
/// template's name and the status the response should carry.
#[derive(Debug, Clone)]
pub struct CompiledPage {
    pub manifest: Arc<AssetManifest>,
    /// Logical path of the template actually compiled.  Differs from the
    /// requested path after a not-found fallback.
    pub template: String,
    pub status: StatusCode,
}

/// Compiles page templates on first use and keeps them, keyed by logical
/// request path, for the life of the process.
pub struct TemplateCompiler {
    registry: RwLock<Handlebars<'static>>,
    loader: SiteLoader,
    public_dirs: Vec<PathBuf>,
    not_found_page: String,
}

impl TemplateCompiler {
    pub fn new(public_dirs: Vec<PathBuf>, not_found_page: impl Into<String>) -> Self {
        Self {
            registry: RwLock::new(Handlebars::new()),
            loader: SiteLoader::new(),
            public_dirs,
            not_found_page: not_found_page.into(),
        }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self::new(site.public_dirs.clone(), site.not_found_page.clone())
    }

    pub fn loader(&self) -> &SiteLoader {
        &self.loader
    }

    /// Whether a template is compiled and cached under `logical_path`.
    pub fn is_compiled(&self, logical_path: &str) -> bool {
        self.registry.read().has_template(logical_path)
    }

    /// Compile the template for `logical_path`.
    ///
    /// If the page cannot be found and `status` is not already 404, the
    /// configured not-found page is compiled instead and the status becomes
    /// 404.  A missing not-found page is returned as [`AssetError::NotFound`].
    pub async fn compile_template(
        &self,
        manifest: Arc<AssetManifest>,
        logical_path: &str,
        status: StatusCode,
    ) -> Result<CompiledPage, AssetError> {
        let compiled = self.compile_one(&manifest, logical_path).await;
        match compiled {
            Ok(()) => Ok(CompiledPage {
                manifest,
                template: logical_path.to_string(),
                status,
            }),
            Err(err)
                if err.is_not_found()
                    && status != StatusCode::NOT_FOUND
                    && logical_path != self.not_found_page =>
            {
                warn!(path = logical_path, fallback = %self.not_found_page, "page not found, using fallback");
                self.compile_one(&manifest, &self.not_found_page).await?;
                Ok(CompiledPage {
                    manifest,
                    template: self.not_found_page.clone(),
                    status: StatusCode::NOT_FOUND,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Render a compiled page with `data` as the template context.
    pub fn render<T: Serialize>(&self, page: &CompiledPage, data: &T) -> Result<String, AssetError> {
        self.registry
            .read()
            .render(&page.template, data)
            .map_err(|e| AssetError::Render {
                name: page.template.clone(),
                message: e.to_string(),
            })
    }

    async fn compile_one(&self, manifest: &AssetManifest, logical_path: &str) -> Result<(), AssetError> {
        if self.is_compiled(logical_path) {
            return Ok(());
        }

        let mut dirs: Vec<PathBuf> = manifest.strings(PUBLIC).into_iter().map(PathBuf::from).collect();
        if dirs.is_empty() {
            dirs = self.public_dirs.clone();
        }

        let resolved = resolve_async(dirs, logical_path).await?;
        let content = self.loader.load(&FileSource::Path(resolved)).await?;
        let template = Template::compile(&*content).map_err(|e| AssetError::Template {
            path: logical_path.to_string(),
            message: e.to_string(),
        })?;

        self.registry.write().register_template(logical_path, template);
        debug!(path = logical_path, "compiled template");
        Ok(())
    }

    /// Load every page and partial a manifest references.
    ///
    /// `htmlFiles` is replaced by the pages' contents (declaration order)
    /// and `templateFiles` by `{name, content}` records, each partial also
    /// being registered under its file stem.  Pages and partials load
    /// concurrently; a file that fails is reported to `reporter` and left
    /// out without disturbing the rest.  The manifest is marked compiled
    /// either way, so later calls return immediately.
    pub async fn compile_site(&self, manifest: &mut AssetManifest, reporter: &dyn ErrorReporter) {
        if manifest.is_compiled() {
            return;
        }

        let pages = manifest.strings(HTML_FILES);
        let partials = manifest.strings(TEMPLATE_FILES);

        let load_pages = join_all(pages.iter().map(|path| self.loader.load_path(path)));
        let load_partials = join_all(partials.iter().map(|path| async move {
            let content = self.loader.load_path(path).await?;
            Ok::<_, AssetError>((partial_name(path), content))
        }));

        let (page_results, partial_results) = join(load_pages, load_partials).await;

        let mut html = Vec::with_capacity(page_results.len());
        for result in page_results {
            match result {
                Ok(content) => html.push(Value::String(content.to_string())),
                Err(err) => reporter.report(&err),
            }
        }

        let mut records = Vec::with_capacity(partial_results.len());
        for result in partial_results {
            match result {
                Ok((name, content)) => {
                    let registered = self.registry.write().register_partial(&name, &*content);
                    match registered {
                        Ok(()) => records.push(json!({ "name": name, "content": &*content })),
                        Err(e) => reporter.report(&AssetError::Template {
                            path: name,
                            message: e.to_string(),
                        }),
                    }
                }
                Err(err) => reporter.report(&err),
            }
        }

        info!(pages = html.len(), partials = records.len(), "site compiled");

        if manifest.contains_key(HTML_FILES) {
            manifest.insert(HTML_FILES, Value::Array(html));
        }
        if manifest.contains_key(TEMPLATE_FILES) {
            manifest.insert(TEMPLATE_FILES, Value::Array(records));
        }
        manifest.insert(COMPILE_SITE, Value::Bool(true));
    }
}

/// Partial name for a template file: its basename without extension.
fn partial_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
