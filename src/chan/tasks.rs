use std::fs::{create_dir_all, write};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chan::fetcher::ThreadSnapshot;

/// Name of the file recording where a thread was downloaded from.
pub(crate) const LINK_FILE_NAME: &str = "link.txt";

#[derive(Error, Debug)]
pub(crate) enum DestinationError {
    #[error("Error creating downloads directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One attachment to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DownloadTask {
    remote_url: String,
    local_path: PathBuf,
}

impl DownloadTask {
    pub(crate) fn new(remote_url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_url: remote_url.into(),
            local_path: local_path.into(),
        }
    }

    pub(crate) fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub(crate) fn local_path(&self) -> &Path {
        &self.local_path
    }
}

/// Turns a thread snapshot into download tasks rooted in `{downloads}/{board}/{slug}`.
#[derive(Debug, Clone)]
pub(crate) struct AttachmentTaskBuilder {
    downloads_root: PathBuf,
    media_host: String,
    board: String,
}

impl AttachmentTaskBuilder {
    pub(crate) fn new(
        downloads_root: impl Into<PathBuf>,
        media_host: impl Into<String>,
        board: impl Into<String>,
    ) -> Self {
        Self {
            downloads_root: downloads_root.into(),
            media_host: media_host.into().trim_end_matches('/').to_string(),
            board: board.into(),
        }
    }

    pub(crate) fn destination_for(&self, snapshot: &ThreadSnapshot) -> PathBuf {
        self.downloads_root.join(&self.board).join(snapshot.slug())
    }

    /// Creates the thread directory and records `thread_url` in it.
    ///
    /// Must complete before any task runs. A failure to write the link file is
    /// only logged.
    pub(crate) fn prepare(
        &self,
        snapshot: &ThreadSnapshot,
        thread_url: &str,
    ) -> Result<PathBuf, DestinationError> {
        let destination = self.destination_for(snapshot);
        create_dir_all(&destination).map_err(|source| DestinationError::Create {
            path: destination.clone(),
            source,
        })?;
        info!("Downloads directory path: {}", destination.display());

        let link_path = destination.join(LINK_FILE_NAME);
        if let Err(e) = write(&link_path, thread_url) {
            warn!(
                "Error creating {} ({}). Input URL for reference: {}",
                link_path.display(),
                e,
                thread_url
            );
        }

        Ok(destination)
    }

    /// One task per attachment, in post order. Text-only posts are skipped.
    pub(crate) fn build(&self, snapshot: &ThreadSnapshot, destination: &Path) -> Vec<DownloadTask> {
        let mut tasks = Vec::with_capacity(snapshot.attachment_count());
        for (index, post) in snapshot.posts().iter().enumerate() {
            let Some(attachment) = post.attachment() else {
                debug!("Skipping: [{}]; not a file.", index);
                continue;
            };

            let file_name = attachment.file_name();
            let remote_url = format!("{}/{}/{}", self.media_host, self.board, file_name);
            debug!(
                "[{}] Queued {}{} as {}",
                index,
                post.original_filename(),
                attachment.extension(),
                file_name
            );
            tasks.push(DownloadTask::new(remote_url, destination.join(file_name)));
        }

        tasks
    }
}
