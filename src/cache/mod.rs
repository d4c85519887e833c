//! Per-device-class module cache.
//!
//! Filtered manifests are memoised in a two-level map: partition (a named
//! namespace, or the default partition) then [`Fingerprint`].  Entries live
//! for the lifetime of the process and are only ever replaced wholesale by
//! [`ModuleCache::set`]; there is no eviction and no TTL.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace};

use crate::agent::{Classification, Fingerprint};
use crate::config::{CacheConfig, WritePolicy};
use crate::manifest::{AgentFilter, AssetManifest, ManifestFilter};

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Partition {
    Default,
    Named(String),
}

impl Partition {
    fn from_namespace(namespace: Option<&str>) -> Self {
        match namespace {
            Some(name) => Partition::Named(name.to_string()),
            None => Partition::Default,
        }
    }
}

type Entries = HashMap<Fingerprint, Arc<AssetManifest>>;

/// Entry counts reported by [`ModuleCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub partitions: usize,
    pub entries: usize,
}

// ---------------------------------------------------------------------------
// ModuleCache
// ---------------------------------------------------------------------------

/// Process-local cache of filtered manifests.
pub struct ModuleCache<F = AgentFilter> {
    partitions: RwLock<HashMap<Partition, Entries>>,
    filter: F,
    policy: CacheConfig,
}

impl ModuleCache<AgentFilter> {
    pub fn new(policy: CacheConfig) -> Self {
        Self::with_filter(AgentFilter, policy)
    }
}

impl<F: ManifestFilter> ModuleCache<F> {
    pub fn with_filter(filter: F, policy: CacheConfig) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            filter,
            policy,
        }
    }

    /// Cached entry for `(namespace, fingerprint)`, if any.  Never computes
    /// or stores anything.
    pub fn cached(&self, fingerprint: &Fingerprint, namespace: Option<&str>) -> Option<Arc<AssetManifest>> {
        let partition = Partition::from_namespace(namespace);
        self.partitions
            .read()
            .get(&partition)
            .and_then(|entries| entries.get(fingerprint))
            .cloned()
    }

    /// Cached entry for the classification, filtering `manifest` and storing
    /// the result on a miss.
    ///
    /// Filtering runs outside the lock.  Two tasks missing on the same key
    /// both compute; the first to store wins and both callers get that
    /// value back.
    pub fn get_or_insert(
        &self,
        classification: &Classification,
        namespace: Option<&str>,
        manifest: &AssetManifest,
    ) -> (Arc<AssetManifest>, CacheStatus) {
        if let Some(hit) = self.cached(&classification.fingerprint, namespace) {
            trace!(fingerprint = %classification.fingerprint, ?namespace, "module cache hit");
            return (hit, CacheStatus::Hit);
        }

        debug!(fingerprint = %classification.fingerprint, ?namespace, "module cache miss");
        let filtered = Arc::new(self.filter.filter(classification, manifest));
        let stored = self.store(classification, namespace, filtered, WritePolicy::WriteOnce);
        (stored, CacheStatus::Miss)
    }

    /// Filter `manifest` for the classification and store it.  An existing
    /// entry is kept or replaced according to the partition's write policy.
    pub fn set(&self, classification: &Classification, namespace: Option<&str>, manifest: &AssetManifest) {
        let policy = self.policy_for(namespace);
        if policy == WritePolicy::WriteOnce && self.cached(&classification.fingerprint, namespace).is_some() {
            trace!(fingerprint = %classification.fingerprint, ?namespace, "write-once entry already present");
            return;
        }

        let filtered = Arc::new(self.filter.filter(classification, manifest));
        self.store(classification, namespace, filtered, policy);
    }

    /// Partition and entry counts.
    pub fn stats(&self) -> CacheStats {
        let partitions = self.partitions.read();
        CacheStats {
            partitions: partitions.len(),
            entries: partitions.values().map(|entries| entries.len()).sum(),
        }
    }

    fn policy_for(&self, namespace: Option<&str>) -> WritePolicy {
        match namespace {
            Some(_) => self.policy.namespaced_policy,
            None => self.policy.default_policy,
        }
    }

    /// Insert under the write lock and return whatever the key now holds.
    fn store(
        &self,
        classification: &Classification,
        namespace: Option<&str>,
        filtered: Arc<AssetManifest>,
        policy: WritePolicy,
    ) -> Arc<AssetManifest> {
        let mut partitions = self.partitions.write();
        let entries = partitions
            .entry(Partition::from_namespace(namespace))
            .or_default();

        match policy {
            WritePolicy::WriteOnce => Arc::clone(
                entries
                    .entry(classification.fingerprint.clone())
                    .or_insert(filtered),
            ),
            WritePolicy::Overwrite => {
                entries.insert(classification.fingerprint.clone(), Arc::clone(&filtered));
                filtered
            }
        }
    }
}
