//! Storage for uploaded images

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// URL prefix uploaded files are served under
pub const UPLOADS_ROUTE: &str = "/uploads";

const MAX_NAME_LEN: usize = 100;

/// A stored upload
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Generated unique file name
    pub file_name: String,
    /// Path the file is served at, e.g. `/uploads/<name>`
    pub public_path: String,
    /// Location on disk
    pub disk_path: PathBuf,
}

/// Writes uploads under unique names and maps served paths back to disk
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Create the store, making sure the directory exists
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create uploads dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store an upload as `<uuid>_<sanitized original name>`
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredUpload> {
        let file_name = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_filename(original_name)
        );
        let disk_path = self.dir.join(&file_name);

        tokio::fs::write(&disk_path, bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", disk_path.display()))?;

        debug!(file = %file_name, bytes = bytes.len(), "Upload stored");

        Ok(StoredUpload {
            public_path: format!("{}/{}", UPLOADS_ROUTE, file_name),
            file_name,
            disk_path,
        })
    }

    /// Map a served path (`/uploads/<name>`) to its file on disk.
    ///
    /// Returns `None` for anything that does not name a single file directly
    /// inside the uploads directory.
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let name = public_path
            .strip_prefix(UPLOADS_ROUTE)?
            .strip_prefix('/')?;

        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return None;
        }

        Some(self.dir.join(name))
    }
}

/// Reduce a client-supplied file name to a safe final path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        return "upload".to_string();
    }

    // Keep the tail so the extension survives truncation
    let skip = trimmed.len().saturating_sub(MAX_NAME_LEN);
    trimmed[skip..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("lesion.jpg"), "lesion.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\my mole.png"), "my_mole.png");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");

        let long = format!("{}.png", "a".repeat(300));
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), MAX_NAME_LEN);
        assert!(sanitized.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_save_generates_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads")).unwrap();

        let first = store.save("mole.jpg", b"one").await.unwrap();
        let second = store.save("mole.jpg", b"two").await.unwrap();

        assert_ne!(first.file_name, second.file_name);
        assert!(first.file_name.ends_with("_mole.jpg"));
        assert_eq!(first.public_path, format!("/uploads/{}", first.file_name));
        assert_eq!(std::fs::read(&first.disk_path).unwrap(), b"one");
        assert_eq!(std::fs::read(&second.disk_path).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_resolve_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();

        let stored = store.save("a.png", b"x").await.unwrap();
        assert_eq!(store.resolve(&stored.public_path), Some(stored.disk_path));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();

        assert_eq!(store.resolve("/uploads/"), None);
        assert_eq!(store.resolve("/uploads/.."), None);
        assert_eq!(store.resolve("/uploads/../model/weights.onnx"), None);
        assert_eq!(store.resolve("/uploads/a\\..\\b"), None);
        assert_eq!(store.resolve("/static/style.css"), None);
        assert_eq!(store.resolve("/uploadsX/a.png"), None);
        assert_eq!(store.resolve("/etc/passwd"), None);
    }
}
