use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:8080`).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
        }
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:8080".to_string()
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Directories searched, in order, for page templates when a manifest
    /// carries no `public` list of its own.
    pub public_dirs: Vec<PathBuf>,
    /// Logical path rendered (with status 404) when a page is missing.
    #[serde(default = "default_not_found_page")]
    pub not_found_page: String,
    /// Logical path served for `/`.
    #[serde(default = "default_index_page")]
    pub index_page: String,
    /// JSON manifests merged, in order, into the default manifest.
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
    /// Named manifest partitions.
    #[serde(default)]
    pub namespaces: HashMap<String, NamespaceConfig>,
    /// Load every manifest's `htmlFiles` / `templateFiles` at startup.
    #[serde(default = "bool_true")]
    pub compile_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceConfig {
    /// Logical page paths served from this namespace.
    #[serde(default)]
    pub pages: Vec<String>,
    /// Manifests merged over the default manifest for this namespace.
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
}

fn default_not_found_page() -> String {
    "/404.html".to_string()
}

fn default_index_page() -> String {
    "/index.html".to_string()
}

fn bool_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Agent classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Query parameter naming a device class to force-enable.
    #[serde(default = "default_override_param")]
    pub override_param: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            override_param: default_override_param(),
        }
    }
}

fn default_override_param() -> String {
    "agent".to_string()
}

// ---------------------------------------------------------------------------
// Module cache
// ---------------------------------------------------------------------------

/// What `set` does when an entry already exists for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Keep the first stored entry.
    WriteOnce,
    /// Replace the stored entry.
    Overwrite,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheConfig {
    /// Policy for named namespaces.
    #[serde(default = "default_namespaced_policy")]
    pub namespaced_policy: WritePolicy,
    /// Policy for the default (un-namespaced) partition.
    #[serde(default = "default_default_policy")]
    pub default_policy: WritePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespaced_policy: default_namespaced_policy(),
            default_policy: default_default_policy(),
        }
    }
}

fn default_namespaced_policy() -> WritePolicy {
    WritePolicy::WriteOnce
}

fn default_default_policy() -> WritePolicy {
    WritePolicy::Overwrite
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config file: {}", path.display()))
}

/// Parse and validate a YAML config document.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(contents).context("failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(
        !config.site.public_dirs.is_empty(),
        "site.public_dirs must list at least one directory"
    );
    anyhow::ensure!(
        config.site.not_found_page.starts_with('/'),
        "site.not_found_page must start with '/'"
    );
    anyhow::ensure!(
        config.site.index_page.starts_with('/'),
        "site.index_page must start with '/'"
    );
    anyhow::ensure!(
        !config.agent.override_param.is_empty(),
        "agent.override_param must not be empty"
    );
    config
        .server
        .http_listen
        .parse::<std::net::SocketAddr>()
        .with_context(|| format!("invalid server.http_listen: {}", config.server.http_listen))?;

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for (name, namespace) in &config.site.namespaces {
        anyhow::ensure!(!name.is_empty(), "namespace names must not be empty");
        for page in &namespace.pages {
            anyhow::ensure!(
                page.starts_with('/'),
                "namespace {name}: page {page} must start with '/'"
            );
            if let Some(other) = owners.insert(page, name) {
                anyhow::bail!("page {page} is claimed by both namespace {other} and {name}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "
site:
  public_dirs: [public]
";

    #[test]
    fn defaults_apply() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.server.http_listen, "0.0.0.0:8080");
        assert_eq!(config.site.not_found_page, "/404.html");
        assert_eq!(config.site.index_page, "/index.html");
        assert!(config.site.compile_on_start);
        assert!(config.site.manifests.is_empty());
        assert_eq!(config.agent.override_param, "agent");
        assert_eq!(config.cache.namespaced_policy, WritePolicy::WriteOnce);
        assert_eq!(config.cache.default_policy, WritePolicy::Overwrite);
    }

    #[test]
    fn full_document() {
        let config = parse_config(
            "
server:
  http_listen: 127.0.0.1:9000
site:
  public_dirs: [/srv/site, /srv/shared]
  not_found_page: /missing.html
  manifests: [assets/base.json]
  namespaces:
    checkout:
      pages: [/checkout.html]
      manifests: [assets/checkout.json]
  compile_on_start: false
agent:
  override_param: device
cache:
  namespaced_policy: overwrite
  default_policy: write-once
",
        )
        .unwrap();

        assert_eq!(config.site.public_dirs.len(), 2);
        assert_eq!(config.site.namespaces["checkout"].pages, vec!["/checkout.html"]);
        assert!(!config.site.compile_on_start);
        assert_eq!(config.agent.override_param, "device");
        assert_eq!(config.cache.namespaced_policy, WritePolicy::Overwrite);
        assert_eq!(config.cache.default_policy, WritePolicy::WriteOnce);
    }

    #[test]
    fn rejects_empty_public_dirs() {
        assert!(parse_config("site:\n  public_dirs: []\n").is_err());
    }

    #[test]
    fn rejects_relative_not_found_page() {
        let err = parse_config("site:\n  public_dirs: [p]\n  not_found_page: 404.html\n").unwrap_err();
        assert!(format!("{err:#}").contains("not_found_page"));
    }

    #[test]
    fn rejects_bad_listen_address() {
        assert!(parse_config("server:\n  http_listen: nowhere\nsite:\n  public_dirs: [p]\n").is_err());
    }

    #[test]
    fn rejects_page_in_two_namespaces() {
        let err = parse_config(
            "
site:
  public_dirs: [p]
  namespaces:
    a:
      pages: [/x.html]
    b:
      pages: [/x.html]
",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("/x.html"));
    }
}
