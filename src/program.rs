use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Error, anyhow};
use console::style;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, trace};

use crate::chan::build_client;
use crate::chan::config::Config;
use crate::chan::fetcher::ThreadFetcher;
use crate::chan::logger::LogContext;
use crate::chan::policy::{BoardVerdict, REFUSAL_MESSAGE};
use crate::chan::pool::{BoundedDownloadPool, PoolReport, WorkerCount};
use crate::chan::sink::FileSink;
use crate::chan::tasks::AttachmentTaskBuilder;
use crate::chan::thread::ThreadLocator;

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-invocation options coming from the command line.
#[derive(Debug, Clone)]
pub(crate) struct RunOptions {
    pub(crate) url: Option<String>,
    pub(crate) workers: WorkerCount,
    pub(crate) log_to_file: bool,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    /// The board is on the deny list; nothing was fetched.
    Refused,
    Completed {
        destination: PathBuf,
        report: PoolReport,
    },
}

/// Drives one thread download from URL to files on disk.
pub(crate) struct Program {
    config: Config,
    options: RunOptions,
}

impl Program {
    pub(crate) fn new(config: Config, options: RunOptions) -> Self {
        Self { config, options }
    }

    /// Runs the downloader. Any returned error is fatal for the whole run.
    pub(crate) async fn run(&self) -> Result<RunOutcome, Error> {
        let url = self
            .options
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("Input an URL to download from."))?;
        let locator = ThreadLocator::parse(url)?;

        if self.config.board_policy().check(locator.board()) == BoardVerdict::Refused {
            println!("{}", REFUSAL_MESSAGE);
            return Ok(RunOutcome::Refused);
        }

        let logging = if self.options.log_to_file {
            LogContext::to_file(self.config.log_directory(), self.config.log_level())
                .context("Failed to set up logging")?
        } else {
            LogContext::disabled()
        };
        let dispatch = logging.dispatch().clone();
        if let Some(path) = logging.path() {
            tracing::dispatcher::with_default(&dispatch, || debug!("Log file: {}", path.display()));
        }

        let result = self
            .download(&locator, url)
            .with_subscriber(dispatch.clone())
            .await;
        if let Err(e) = &result {
            tracing::dispatcher::with_default(&dispatch, || error!("{:#}", e));
        }
        result
    }

    async fn download(&self, locator: &ThreadLocator, thread_url: &str) -> Result<RunOutcome, Error> {
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);
        trace!("Config: {:?}", self.config);

        let workers = self.options.workers;
        let banner = format!(
            "Starting on board: '{}', thread: '{}' with '{}' workers.",
            locator.board(),
            locator.thread_number(),
            workers
        );
        info!("{}", banner);
        println!("{}", style(&banner).bold());

        let client = build_client(&self.config, workers).context("Failed to build HTTP client")?;
        let fetcher = ThreadFetcher::new(client.clone());
        fetcher.probe(locator).await?;
        let snapshot = fetcher.fetch(locator).await?;

        let builder = AttachmentTaskBuilder::new(
            self.config.download_directory(),
            self.config.media_host(),
            locator.board(),
        );
        let destination = builder.prepare(&snapshot, thread_url)?;
        let tasks = builder.build(&snapshot, &destination);
        drop(snapshot);

        let pool = BoundedDownloadPool::new(workers);
        let report = pool.run(tasks, Arc::new(FileSink::new(client))).await;

        info!(
            "Finished. {} of {} files saved to {}",
            report.succeeded,
            report.dispatched,
            destination.display()
        );
        Ok(RunOutcome::Completed {
            destination,
            report,
        })
    }
}
