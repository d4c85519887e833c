use std::path::{Component, Path, PathBuf};

use crate::error::AssetError;

/// Find `relative` under the first of `base_dirs` that contains it as a
/// regular file.
///
/// A leading `/` on `relative` is ignored, so logical request paths can be
/// passed straight through.  Paths that climb out of the base directory
/// (`..`) never resolve.
pub fn resolve<P: AsRef<Path>>(base_dirs: &[P], relative: &str) -> Result<PathBuf, AssetError> {
    let trimmed = Path::new(relative.trim_start_matches('/'));
    let escapes = trimmed
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if !escapes {
        for dir in base_dirs {
            let candidate = dir.as_ref().join(trimmed);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(AssetError::NotFound {
        path: relative.to_string(),
        searched: base_dirs.iter().map(|d| d.as_ref().to_path_buf()).collect(),
    })
}

/// [`resolve`] on the blocking pool.
pub async fn resolve_async(base_dirs: Vec<PathBuf>, relative: &str) -> Result<PathBuf, AssetError> {
    let owned = relative.to_string();
    tokio::task::spawn_blocking(move || resolve(&base_dirs, &owned))
        .await
        .map_err(|e| AssetError::Io {
            path: PathBuf::from(relative),
            source: std::io::Error::other(e),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_directory_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("page.html"), "first").unwrap();
        std::fs::write(second.path().join("page.html"), "second").unwrap();

        let found = resolve(&[first.path(), second.path()], "/page.html").unwrap();
        assert_eq!(found, first.path().join("page.html"));
    }

    #[test]
    fn falls_through_to_later_directories() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::create_dir(second.path().join("nested")).unwrap();
        std::fs::write(second.path().join("nested/page.html"), "x").unwrap();

        let found = resolve(&[first.path(), second.path()], "nested/page.html").unwrap();
        assert_eq!(found, second.path().join("nested/page.html"));
    }

    #[test]
    fn missing_file_reports_searched_dirs() {
        let dir = tempfile::tempdir().unwrap();
        match resolve(&[dir.path()], "/missing.html") {
            Err(AssetError::NotFound { path, searched }) => {
                assert_eq!(path, "/missing.html");
                assert_eq!(searched, vec![dir.path().to_path_buf()]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn directories_do_not_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("page.html")).unwrap();
        assert!(resolve(&[dir.path()], "page.html").unwrap_err().is_not_found());
    }

    #[test]
    fn parent_components_are_rejected() {
        let outer = tempfile::tempdir().unwrap();
        let inner = outer.path().join("public");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(outer.path().join("secret.html"), "x").unwrap();

        assert!(resolve(&[&inner], "/../secret.html").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn async_matches_sync() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.html"), "a").unwrap();

        let found = resolve_async(vec![dir.path().to_path_buf()], "/a.html").await.unwrap();
        assert_eq!(found, resolve(&[dir.path()], "/a.html").unwrap());
        assert!(resolve_async(vec![dir.path().to_path_buf()], "/b.html")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
