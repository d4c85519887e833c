//! Declarative asset manifests.
//!
//! A manifest maps category names to JSON values.  Array categories list
//! assets either as plain filenames (served to every device) or as
//! `{ "name": ..., "agents": [...] }` entries (served only to the listed
//! device classes).  Everything else is carried through untouched.
//!
//! - [`merge`] folds one manifest into another.
//! - [`filter`] reduces a manifest to a single [`Classification`].
//! - [`ManifestSet`] loads the configured manifest files at startup.
//!
//! [`Classification`]: crate::agent::Classification

pub mod filter;
pub mod merge;
pub mod set;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use filter::{filter, AgentFilter, ManifestFilter};
pub use merge::merge;
pub use set::{load_manifest, ManifestSet};

// ---------------------------------------------------------------------------
// Well-known categories
// ---------------------------------------------------------------------------

pub const SCRIPTS: &str = "scripts";
pub const STYLESHEETS: &str = "stylesheets";
pub const TRAILING_SCRIPTS: &str = "trailingScripts";
pub const TEMPLATE_FILES: &str = "templateFiles";
pub const HTML_FILES: &str = "htmlFiles";
/// Candidate base directories for page lookup.
pub const PUBLIC: &str = "public";
/// Set once `compile_site` has loaded the manifest's files.
pub const COMPILE_SITE: &str = "compileSite";

/// Reserved: page templates receive the request's classification under
/// this key, so manifests may not define it.
pub const AGENT_CONTEXT: &str = "agent";

/// Categories whose entries are filtered per device class.
pub const AGENT_CATEGORIES: [&str; 3] = [SCRIPTS, STYLESHEETS, TRAILING_SCRIPTS];

// ---------------------------------------------------------------------------
// AssetManifest
// ---------------------------------------------------------------------------

/// A category → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest(Map<String, Value>);

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// String entries of an array category.  A missing or non-array
    /// category yields nothing; non-string entries are skipped.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.0.get(COMPILE_SITE).and_then(Value::as_bool).unwrap_or(false)
    }

}

impl TryFrom<Value> for AssetManifest {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

// ---------------------------------------------------------------------------
// Asset entries
// ---------------------------------------------------------------------------

/// One entry of an agent-sensitive category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetEntry {
    /// Served to every device class.
    Name(String),
    /// Served only to the listed classes.
    Targeted { name: String, agents: Vec<String> },
}

impl AssetEntry {
    pub fn name(&self) -> &str {
        match self {
            AssetEntry::Name(name) | AssetEntry::Targeted { name, .. } => name,
        }
    }
}
