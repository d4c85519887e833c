use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use super::{AssetEntry, AssetManifest, AGENT_CATEGORIES};
use crate::agent::Classification;

/// Reduce `manifest` to the assets relevant for `classification`.
///
/// Agent-sensitive categories (`scripts`, `stylesheets`, `trailingScripts`)
/// keep their plain filenames and those targeted entries whose `agents` list
/// names one of the matched classes.  Each filename appears at most once per
/// category, at the position of its first qualifying entry.  Every other
/// key, `templateFiles` included, is copied through unchanged.
pub fn filter(classification: &Classification, manifest: &AssetManifest) -> AssetManifest {
    let mut filtered = AssetManifest::new();

    for (key, value) in manifest.iter() {
        if AGENT_CATEGORIES.contains(&key.as_str()) {
            filtered.insert(key.clone(), filter_category(classification, key, value));
        } else {
            filtered.insert(key.clone(), value.clone());
        }
    }

    filtered
}

fn filter_category(classification: &Classification, category: &str, value: &Value) -> Value {
    let Value::Array(entries) = value else {
        debug!(category, "agent category is not an array, treating as empty");
        return Value::Array(Vec::new());
    };

    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(entries.len());

    for raw in entries {
        let entry = match serde_json::from_value::<AssetEntry>(raw.clone()) {
            Ok(entry) => entry,
            Err(_) => {
                debug!(category, entry = %raw, "skipping malformed asset entry");
                continue;
            }
        };

        let wanted = match &entry {
            AssetEntry::Name(_) => true,
            AssetEntry::Targeted { agents, .. } => classification
                .matched
                .iter()
                .any(|class| class.listed_in(agents.as_slice())),
        };

        if wanted && seen.insert(entry.name().to_string()) {
            selected.push(Value::String(entry.name().to_string()));
        }
    }

    Value::Array(selected)
}

// ---------------------------------------------------------------------------
// Injectable filter
// ---------------------------------------------------------------------------

/// Filtering capability used by the module cache.
pub trait ManifestFilter: Send + Sync {
    fn filter(&self, classification: &Classification, manifest: &AssetManifest) -> AssetManifest;
}

/// The standard per-agent filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentFilter;

impl ManifestFilter for AgentFilter {
    fn filter(&self, classification: &Classification, manifest: &AssetManifest) -> AssetManifest {
        filter(classification, manifest)
    }
}
