//! Model artifact provisioning from a remote model registry.
//!
//! Artifacts are downloaded once into the local model directory and reused on
//! every later start. A file that is already present is never re-fetched.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Source of model artifacts
#[allow(async_fn_in_trait)]
pub trait ArtifactFetcher {
    /// Download `filename` from repository `repo_id` into `dest`.
    ///
    /// Returns the number of bytes written.
    async fn fetch(&self, repo_id: &str, filename: &str, dest: &Path) -> Result<u64>;
}

/// Fetches artifacts over HTTP using the `{registry}/{repo}/resolve/{revision}/{file}`
/// URL layout.
pub struct HttpFetcher {
    client: reqwest::Client,
    registry_url: String,
    revision: String,
    token: Option<String>,
}

impl HttpFetcher {
    /// Create a fetcher for the given registry and revision
    pub fn new(registry_url: &str, revision: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            registry_url: registry_url.trim_end_matches('/').to_string(),
            revision: revision.to_string(),
            token: None,
        })
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Download URL for an artifact
    pub fn artifact_url(&self, repo_id: &str, filename: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.registry_url, repo_id, self.revision, filename
        )
    }
}

impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, repo_id: &str, filename: &str, dest: &Path) -> Result<u64> {
        let url = self.artifact_url(repo_id, filename);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach model registry at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Model registry returned {} for {}", status, url);
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Download of {} interrupted", url))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        debug!(url = %url, bytes = written, "Artifact download finished");
        Ok(written)
    }
}

/// Ensures model artifacts exist in the local model directory
pub struct ModelProvisioner<F = HttpFetcher> {
    fetcher: F,
    repo_id: String,
    model_dir: PathBuf,
}

impl<F: ArtifactFetcher> ModelProvisioner<F> {
    /// Create a provisioner for one registry repository
    pub fn new(fetcher: F, repo_id: &str, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            repo_id: repo_id.to_string(),
            model_dir: model_dir.into(),
        }
    }

    /// Local path an artifact is cached at
    pub fn local_path(&self, filename: &str) -> PathBuf {
        self.model_dir.join(filename)
    }

    /// Make sure `filename` is present locally, downloading it if needed.
    pub async fn ensure(&self, filename: &str) -> Result<PathBuf> {
        let path = self.local_path(filename);

        let exists = tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check {}", path.display()))?;
        if exists {
            info!(path = %path.display(), "Model artifact already exists locally");
            return Ok(path);
        }

        info!(
            repo = %self.repo_id,
            file = %filename,
            "Model artifact not found locally, downloading from registry"
        );

        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .with_context(|| format!("Failed to create model dir {}", self.model_dir.display()))?;

        // Download next to the target and rename once complete, so a partial
        // file is never picked up as a finished artifact.
        let partial = partial_path(&path);
        let bytes = match self.fetcher.fetch(&self.repo_id, filename, &partial).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e.context(format!(
                    "Failed to download {} from {}",
                    filename, self.repo_id
                )));
            }
        };

        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("Failed to move artifact into {}", path.display()))?;

        info!(path = %path.display(), bytes = bytes, "Model artifact downloaded");
        Ok(path)
    }

    /// Ensure several artifacts, in order
    pub async fn ensure_all(&self, filenames: &[&str]) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(filenames.len());
        for filename in filenames {
            paths.push(self.ensure(filename).await?);
        }
        Ok(paths)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes fixed bytes and counts how often it was called
    struct CountingFetcher {
        calls: AtomicUsize,
        payload: Vec<u8>,
        fail: bool,
    }

    impl CountingFetcher {
        fn new(payload: &[u8]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                payload: payload.to_vec(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(b"")
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ArtifactFetcher for CountingFetcher {
        async fn fetch(&self, _repo_id: &str, _filename: &str, dest: &Path) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Leave a partial file behind to check cleanup
            tokio::fs::write(dest, &self.payload).await?;
            if self.fail {
                anyhow::bail!("registry unavailable");
            }
            Ok(self.payload.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"cached").unwrap();

        let provisioner =
            ModelProvisioner::new(CountingFetcher::new(b"fresh"), "org/model", dir.path());
        let path = provisioner.ensure("model.onnx").await.unwrap();

        assert_eq!(provisioner.fetcher.calls(), 0);
        assert_eq!(std::fs::read(path).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_missing_file_is_downloaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("nested").join("model");

        let provisioner =
            ModelProvisioner::new(CountingFetcher::new(b"weights"), "org/model", &model_dir);

        let path = provisioner.ensure("model.onnx").await.unwrap();
        assert_eq!(path, model_dir.join("model.onnx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"weights");
        assert!(!partial_path(&path).exists());

        provisioner.ensure("model.onnx").await.unwrap();
        assert_eq!(provisioner.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = ModelProvisioner::new(CountingFetcher::failing(), "org/model", dir.path());

        let err = provisioner.ensure("model.onnx").await.unwrap_err();
        assert!(format!("{:#}", err).contains("registry unavailable"));
        assert!(!dir.path().join("model.onnx").exists());
        assert!(!dir.path().join("model.onnx.part").exists());
    }

    #[tokio::test]
    async fn test_unreadable_model_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        let provisioner =
            ModelProvisioner::new(CountingFetcher::new(b"weights"), "org/model", blocker.join("model"));

        assert!(provisioner.ensure("model.onnx").await.is_err());
        assert_eq!(provisioner.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.onnx"), b"a").unwrap();

        let provisioner = ModelProvisioner::new(CountingFetcher::new(b"b"), "org/model", dir.path());
        let paths = provisioner.ensure_all(&["a.onnx", "b.json"]).await.unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(provisioner.fetcher.calls(), 1);
    }

    #[test]
    fn test_artifact_url() {
        let fetcher = HttpFetcher::new("https://huggingface.co/", "main").unwrap();
        assert_eq!(
            fetcher.artifact_url("org/classifier", "backbone.onnx"),
            "https://huggingface.co/org/classifier/resolve/main/backbone.onnx"
        );
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/model.onnx")),
            PathBuf::from("/tmp/model.onnx.part")
        );
    }
}
