use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::AssetError;

/// Producer for programmatically generated content.
pub type Generator = Arc<dyn Fn() -> BoxFuture<'static, Result<String, AssetError>> + Send + Sync>;

/// Where a piece of site content comes from.
#[derive(Clone)]
pub enum FileSource {
    /// A file on disk; its content is cached by absolute path.
    Path(PathBuf),
    /// A producer invoked on every load; never cached.
    Generator(Generator),
}

impl FileSource {
    pub fn generator<F, Fut>(produce: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, AssetError>> + Send + 'static,
    {
        FileSource::Generator(Arc::new(move || produce().boxed()))
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        FileSource::Path(path)
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        FileSource::Path(path.to_path_buf())
    }
}

impl From<&str> for FileSource {
    fn from(path: &str) -> Self {
        FileSource::Path(PathBuf::from(path))
    }
}

// ---------------------------------------------------------------------------
// SiteLoader
// ---------------------------------------------------------------------------

/// Reads site files and keeps their text in memory for the life of the
/// process.
#[derive(Default)]
pub struct SiteLoader {
    files: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl SiteLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the content behind `source`.
    ///
    /// Paths are read once and served from memory afterwards; a failed read
    /// is not cached and will be retried by the next call.
    pub async fn load(&self, source: &FileSource) -> Result<Arc<str>, AssetError> {
        let path = match source {
            FileSource::Generator(produce) => return produce().await.map(Arc::from),
            FileSource::Path(path) => path,
        };

        let key = std::path::absolute(path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;

        let cached = self.files.read().get(&key).cloned();
        if let Some(content) = cached {
            trace!(path = %key.display(), "file cache hit");
            return Ok(content);
        }

        let content: Arc<str> = tokio::fs::read_to_string(&key)
            .await
            .map_err(|source| AssetError::Io {
                path: key.clone(),
                source,
            })?
            .into();

        debug!(path = %key.display(), bytes = content.len(), "loaded file");
        self.files.write().insert(key, Arc::clone(&content));
        Ok(content)
    }

    pub(crate) async fn load_path(&self, path: &str) -> Result<Arc<str>, AssetError> {
        self.load(&FileSource::Path(PathBuf::from(path))).await
    }

    /// Number of files held in memory.
    pub fn cached_files(&self) -> usize {
        self.files.read().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn path_content_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        std::fs::write(&file, "v1").unwrap();

        let loader = SiteLoader::new();
        assert_eq!(&*loader.load(&file.clone().into()).await.unwrap(), "v1");

        std::fs::write(&file, "v2").unwrap();
        assert_eq!(&*loader.load(&file.clone().into()).await.unwrap(), "v1");
        assert_eq!(loader.cached_files(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SiteLoader::new();

        let err = loader
            .load(&dir.path().join("missing.html").into())
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        assert_eq!(loader.cached_files(), 0);
    }

    #[tokio::test]
    async fn generators_run_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = {
            let calls = Arc::clone(&calls);
            FileSource::generator(move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(format!("generated {n}")) }
            })
        };

        let loader = SiteLoader::new();
        assert_eq!(&*loader.load(&source).await.unwrap(), "generated 0");
        assert_eq!(&*loader.load(&source).await.unwrap(), "generated 1");
        assert_eq!(loader.cached_files(), 0);
    }

    #[tokio::test]
    async fn generator_errors_propagate() {
        let source = FileSource::generator(|| async {
            Err(AssetError::NotFound {
                path: "generated".into(),
                searched: Vec::new(),
            })
        });

        let err = SiteLoader::new().load(&source).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
