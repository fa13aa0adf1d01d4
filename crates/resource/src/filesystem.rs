//! Filesystem-backed fetcher for `file://` resources.
//!
//! Documents edited offline reference images next to the source sheet; a
//! `file://` base URL resolves them here. Every resolved path must stay
//! inside the configured root to prevent traversal (`../../etc/passwd`).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tabula_traits::{FetchedResource, ResourceError, ResourceFetcher};
use url::Url;

#[derive(Debug)]
pub struct FilesystemFetcher {
    root: PathBuf,
    /// Canonicalized root for containment checks
    canonical_root: Option<PathBuf>,
}

impl FilesystemFetcher {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        // May fail if the directory does not exist yet
        let canonical_root = root.canonicalize().ok();
        Self {
            root,
            canonical_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `file://` URL of the root directory, usable as a base URL.
    pub fn base_url(&self) -> Option<Url> {
        let dir = self.canonical_root.as_ref().unwrap_or(&self.root);
        Url::from_directory_path(dir).ok()
    }

    /// Maps a `file://` URL to a path under the root, or `None` if it escapes.
    fn resolve_path_safe(&self, url: &str) -> Option<PathBuf> {
        let path = Url::parse(url).ok()?.to_file_path().ok()?;

        if let Ok(canonical) = path.canonicalize()
            && let Some(ref root) = self.canonical_root
        {
            return canonical.starts_with(root).then_some(canonical);
        }

        // Not on disk (yet): fall back to a lexical check
        let escapes = path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
        (!escapes && path.starts_with(&self.root)).then_some(path)
    }
}

#[async_trait]
impl ResourceFetcher for FilesystemFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError> {
        let path = self
            .resolve_path_safe(url)
            .ok_or_else(|| ResourceError::NotFound(format!("{} (outside resource root)", url)))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchedResource::new(bytes, content_type_for(&path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResourceError::NotFound(url.to_string()))
            }
            Err(e) => Err(ResourceError::NetworkFailure {
                url: url.to_string(),
                status: None,
                message: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "FilesystemFetcher"
    }
}

fn content_type_for(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}
