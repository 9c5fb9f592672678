use anyhow::Error;
use clap::Parser;
use console::Term;

use crate::chan::config::Config;
use crate::chan::pool::WorkerCount;
use crate::cli::Cli;
use crate::program::{Program, RunOptions};

mod chan;
mod cli;
mod program;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    Term::stdout().set_title("chan thread downloader");

    let mut config = Config::load(&cli.config)?;
    if let Some(output) = cli.output {
        config.set_download_directory(output);
    }

    let program = Program::new(
        config,
        RunOptions {
            url: cli.url,
            workers: WorkerCount::from_requested(cli.workers),
            log_to_file: !cli.no_log,
        },
    );
    program.run().await?;

    Ok(())
}
