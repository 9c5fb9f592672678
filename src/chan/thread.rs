use std::fmt;

use thiserror::Error;
use url::Url;

/// Errors raised while turning the user supplied URL into a thread location.
#[derive(Error, Debug)]
pub(crate) enum LocatorError {
    #[error("Invalid thread URL \"{url}\": {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme \"{0}\", expected http or https")]
    Scheme(String),

    #[error("Thread URL \"{0}\" has no board segment")]
    MissingBoard(String),

    #[error("Thread URL \"{0}\" has no thread number")]
    MissingThread(String),
}

/// Where a single thread lives: its board and number on a given origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ThreadLocator {
    origin: Url,
    board: String,
    thread_number: u64,
    page_url: String,
}

impl ThreadLocator {
    /// Parses a thread URL of the shape `{origin}/{board}/thread/{number}[/{slug}]`.
    pub(crate) fn parse(input: &str) -> Result<Self, LocatorError> {
        let mut url = Url::parse(input.trim()).map_err(|source| LocatorError::Parse {
            url: input.to_string(),
            source,
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(LocatorError::Scheme(url.scheme().to_string()));
        }
        url.set_fragment(None);
        url.set_query(None);

        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let board = segments
            .first()
            .cloned()
            .ok_or_else(|| LocatorError::MissingBoard(input.to_string()))?;
        let thread_number = match (segments.get(1).map(String::as_str), segments.get(2)) {
            (Some("thread"), Some(number)) => number
                .trim_end_matches(".json")
                .parse::<u64>()
                .map_err(|_| LocatorError::MissingThread(input.to_string()))?,
            _ => return Err(LocatorError::MissingThread(input.to_string())),
        };

        let page_url = url.as_str().trim_end_matches('/').to_string();
        let mut origin = url;
        origin.set_path("");

        Ok(Self {
            origin,
            board,
            thread_number,
            page_url,
        })
    }

    pub(crate) fn board(&self) -> &str {
        &self.board
    }

    pub(crate) fn thread_number(&self) -> u64 {
        self.thread_number
    }

    /// The thread page as the user supplied it, minus any fragment or query.
    pub(crate) fn page_url(&self) -> &str {
        &self.page_url
    }

    /// The JSON endpoint holding the thread's post list.
    pub(crate) fn metadata_url(&self) -> String {
        format!(
            "{}/{}/thread/{}.json",
            self.origin.as_str().trim_end_matches('/'),
            self.board,
            self.thread_number
        )
    }
}

impl fmt::Display for ThreadLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.board, self.thread_number)
    }
}
