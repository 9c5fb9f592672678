use std::path::PathBuf;

use clap::Parser;

use crate::chan::config::CONFIG_NAME;

#[derive(Debug, Parser)]
#[command(name = "chan_thread_downloader")]
#[command(about = "Downloads every attachment of an imageboard thread", long_about = None, version)]
pub(crate) struct Cli {
    /// URL of the thread to download from.
    #[arg(short = 'u', long)]
    pub(crate) url: Option<String>,

    /// Number of downloads allowed to run at the same time.
    #[arg(short = 't', long = "threads", default_value_t = 1, allow_negative_numbers = true)]
    pub(crate) workers: i64,

    /// Path of the JSON config file.
    #[arg(short = 'c', long, default_value = CONFIG_NAME)]
    pub(crate) config: PathBuf,

    /// Overrides the download directory from the config file.
    #[arg(short = 'o', long)]
    pub(crate) output: Option<PathBuf>,

    /// Do not write a log file.
    #[arg(long)]
    pub(crate) no_log: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["chan_thread_downloader"]).unwrap();
        assert_eq!(cli.url, None);
        assert_eq!(cli.workers, 1);
        assert_eq!(cli.config, PathBuf::from(CONFIG_NAME));
        assert!(cli.output.is_none());
        assert!(!cli.no_log);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "chan_thread_downloader",
            "-u",
            "https://boards.4chan.org/g/thread/1",
            "-t",
            "8",
            "-o",
            "/tmp/out",
            "--no-log",
        ])
        .unwrap();
        assert_eq!(cli.url.as_deref(), Some("https://boards.4chan.org/g/thread/1"));
        assert_eq!(cli.workers, 8);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));
        assert!(cli.no_log);
    }

    #[test]
    fn test_negative_worker_count_is_accepted() {
        let cli = Cli::try_parse_from(["chan_thread_downloader", "-t", "-3"]).unwrap();
        assert_eq!(cli.workers, -3);
    }
}
