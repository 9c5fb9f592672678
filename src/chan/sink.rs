use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tokio::fs::{remove_file, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::chan::tasks::DownloadTask;

/// Why a single attachment could not be saved. Never aborts the run.
#[derive(Error, Debug)]
pub(crate) enum SinkError {
    #[error("Error connecting to server: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server answered {0}")]
    Status(StatusCode),

    #[error("Error with creating file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error saving file {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Destination for the body of one download task.
#[async_trait]
pub(crate) trait TaskSink: Send + Sync + 'static {
    /// Saves the task's content and returns the number of bytes written.
    async fn deliver(&self, task: &DownloadTask) -> Result<u64, SinkError>;
}

/// Streams attachments from the media host straight to disk.
#[derive(Debug, Clone)]
pub(crate) struct FileSink {
    client: Client,
}

impl FileSink {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    async fn stream_to_file(response: Response, path: &Path) -> Result<u64, SinkError> {
        // created only once the response is known to be good; truncates previous runs
        let mut file = File::create(path).await.map_err(|source| SinkError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SinkError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await.map_err(|e| SinkError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| SinkError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(written)
    }
}

#[async_trait]
impl TaskSink for FileSink {
    async fn deliver(&self, task: &DownloadTask) -> Result<u64, SinkError> {
        let response = self.client.get(task.remote_url()).send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status(response.status()));
        }

        let path = task.local_path();
        match Self::stream_to_file(response, path).await {
            Ok(written) => {
                debug!("Saved {} ({} bytes)", path.display(), written);
                Ok(written)
            }
            Err(e) => {
                if let SinkError::Write { .. } = e {
                    if let Err(remove_err) = remove_file(path).await {
                        warn!("Failed to remove partial file {}: {}", path.display(), remove_err);
                    }
                }
                Err(e)
            }
        }
    }
}
