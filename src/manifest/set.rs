use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{merge, AssetManifest, AGENT_CONTEXT};
use crate::config::SiteConfig;

/// The manifests a site serves from: one default manifest plus one merged
/// manifest per configured namespace.
#[derive(Debug, Clone, Default)]
pub struct ManifestSet {
    default: AssetManifest,
    namespaces: HashMap<String, AssetManifest>,
    /// Logical page path -> namespace name.
    pages: HashMap<String, String>,
}

impl ManifestSet {
    /// Load every manifest file named in `site`.
    ///
    /// The default manifest is the in-order merge of `site.manifests`.  Each
    /// namespace starts from a copy of the default and merges its own files
    /// on top.
    pub fn load(site: &SiteConfig) -> Result<Self> {
        let mut default = AssetManifest::new();
        for path in &site.manifests {
            merge(&mut default, &load_manifest(path)?);
        }

        let mut namespaces = HashMap::with_capacity(site.namespaces.len());
        let mut pages = HashMap::new();
        for (name, ns) in &site.namespaces {
            let mut manifest = default.clone();
            for path in &ns.manifests {
                merge(&mut manifest, &load_manifest(path)?);
            }
            for page in &ns.pages {
                pages.insert(page.clone(), name.clone());
            }
            namespaces.insert(name.clone(), manifest);
        }

        info!(
            default_keys = default.len(),
            namespaces = namespaces.len(),
            "asset manifests loaded"
        );

        Ok(Self {
            default,
            namespaces,
            pages,
        })
    }

    /// Namespace and manifest that serve `logical_path`.  Pages not claimed
    /// by a namespace use the default manifest and partition.
    pub fn for_page(&self, logical_path: &str) -> (Option<&str>, &AssetManifest) {
        match self.pages.get(logical_path) {
            Some(name) => match self.namespaces.get(name) {
                Some(manifest) => (Some(name.as_str()), manifest),
                None => (None, &self.default),
            },
            None => (None, &self.default),
        }
    }

    pub fn default_manifest(&self) -> &AssetManifest {
        &self.default
    }

    /// Every manifest in the set, default first.
    pub fn manifests_mut(&mut self) -> impl Iterator<Item = (Option<&str>, &mut AssetManifest)> {
        std::iter::once((None, &mut self.default)).chain(
            self.namespaces
                .iter_mut()
                .map(|(name, manifest)| (Some(name.as_str()), manifest)),
        )
    }
}

/// Read a JSON manifest file.  The top-level `agent` key is reserved for
/// the template context and rejected.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<AssetManifest> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let manifest: AssetManifest = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse manifest: {}", path.display()))?;
    anyhow::ensure!(
        !manifest.contains_key(AGENT_CONTEXT),
        "manifest {} defines reserved key '{AGENT_CONTEXT}'",
        path.display()
    );
    Ok(manifest)
}
