use std::cmp::max;

use reqwest::Client;

use crate::chan::config::Config;
use crate::chan::pool::WorkerCount;

pub(crate) mod config;
pub(crate) mod fetcher;
pub(crate) mod logger;
pub(crate) mod policy;
pub(crate) mod pool;
pub(crate) mod sink;
pub(crate) mod tasks;
pub(crate) mod thread;

/// Idle connections kept per host, at minimum.
const MIN_IDLE_PER_HOST: usize = 10;

/// Builds the HTTP client shared by the metadata fetch and every download.
///
/// No request timeout is set: a stalled transfer holds its slot until the
/// server gives up.
pub(crate) fn build_client(config: &Config, workers: WorkerCount) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent())
        .gzip(true)
        .tcp_nodelay(true)
        .pool_max_idle_per_host(max(workers.get(), MIN_IDLE_PER_HOST))
        .build()
}
