//! Sanctions list retrieval
//!
//! One GET against the configured endpoint; any failure is returned to the
//! caller, who decides whether to trigger another attempt.

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A sanctions list stored on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedList {
    pub path: PathBuf,
    /// File size
    pub bytes: u64,
}

/// Where the raw sanctions list comes from
#[async_trait]
pub trait ListSource: Send + Sync {
    /// Produce a local copy of the list
    async fn fetch(&self) -> Result<DownloadedList, RetrievalError>;

    /// Source name for logs
    fn name(&self) -> &str;
}

/// Downloads the list over HTTP
#[derive(Debug, Clone)]
pub struct HttpListSource {
    config: RetrievalConfig,
    client: Client,
}

impl HttpListSource {
    pub fn new(config: RetrievalConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }

    fn target_file(&self) -> Result<TempPath, RetrievalError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sanctions-").suffix(".csv");

        let file = match &self.config.download_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }
}

/// Run `write` against the temp file and keep it only if the write succeeds.
/// On failure the file is removed when `target` drops.
async fn persist<W, Fut>(target: TempPath, write: W) -> Result<PathBuf, RetrievalError>
where
    W: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    write(target.to_path_buf()).await?;
    // the caller owns the file from here on
    Ok(target.keep().map_err(|e| e.error)?)
}

#[async_trait]
impl ListSource for HttpListSource {
    async fn fetch(&self) -> Result<DownloadedList, RetrievalError> {
        info!("Downloading sanctions list from {}", self.config.url);

        let response = self.client.get(&self.config.url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Sanctions list download failed with HTTP {}", status.as_u16());
            return Err(RetrievalError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            warn!("Sanctions list download returned no content");
            return Err(RetrievalError::EmptyBody);
        }

        let target = self.target_file()?;
        let contents = body.clone();
        let path = persist(target, move |path| tokio::fs::write(path, contents)).await?;

        info!("Sanctions list saved to {} ({} bytes)", path.display(), body.len());
        Ok(DownloadedList {
            path,
            bytes: body.len() as u64,
        })
    }

    fn name(&self) -> &str {
        "HTTP"
    }
}

/// A list that is already on disk
#[derive(Debug, Clone)]
pub struct LocalListSource {
    path: PathBuf,
}

impl LocalListSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ListSource for LocalListSource {
    async fn fetch(&self) -> Result<DownloadedList, RetrievalError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(RetrievalError::NotFound(self.path.display().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetrievalError::NotFound(self.path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(DownloadedList {
            path: self.path.clone(),
            bytes: metadata.len(),
        })
    }

    fn name(&self) -> &str {
        "local file"
    }
}

/// Fetch in the background
pub fn spawn_download(source: Arc<dyn ListSource>) -> JoinHandle<Result<DownloadedList, RetrievalError>> {
    tokio::spawn(async move {
        let result = source.fetch().await;
        if let Err(e) = &result {
            warn!("Sanctions list retrieval from {} failed: {}", source.name(), e);
        }
        result
    })
}
