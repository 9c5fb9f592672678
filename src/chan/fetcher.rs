use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::chan::thread::ThreadLocator;

/// Error types for the metadata fetch. Every variant aborts the run.
#[derive(Error, Debug)]
pub(crate) enum FetchError {
    #[error("Failed to query {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid input URL or IP banned. Request status: {status} ({url})")]
    Status { url: String, status: StatusCode },

    #[error("Failed to read queried body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed during JSON decode: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread schema violation: {0}")]
    Schema(String),
}

pub(crate) type FetchResult<T> = Result<T, FetchError>;

/// Wire shape of `{thread}.json`. Unknown fields are ignored.
#[derive(Deserialize, Debug)]
struct ThreadDto {
    posts: Vec<PostDto>,
}

#[derive(Deserialize, Debug)]
struct PostDto {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    ext: String,
    #[serde(default)]
    tim: Option<i64>,
    #[serde(default)]
    semantic_url: Option<String>,
}

/// The file carried by a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attachment {
    timestamp_id: i64,
    extension: String,
}

impl Attachment {
    pub(crate) fn new(timestamp_id: i64, extension: impl Into<String>) -> Self {
        Self {
            timestamp_id,
            extension: extension.into(),
        }
    }

    pub(crate) fn extension(&self) -> &str {
        &self.extension
    }

    /// Remote and local file name, e.g. `1700000000123.jpg`.
    pub(crate) fn file_name(&self) -> String {
        format!("{}{}", self.timestamp_id, self.extension)
    }
}

/// One post of a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PostRecord {
    original_filename: String,
    attachment: Option<Attachment>,
    semantic_slug: Option<String>,
}

impl PostRecord {
    pub(crate) fn new(
        original_filename: impl Into<String>,
        attachment: Option<Attachment>,
        semantic_slug: Option<String>,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            attachment,
            semantic_slug,
        }
    }

    pub(crate) fn original_filename(&self) -> &str {
        &self.original_filename
    }

    /// `None` for text-only posts.
    pub(crate) fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub(crate) fn semantic_slug(&self) -> Option<&str> {
        self.semantic_slug.as_deref()
    }
}

/// Posts of a thread in reply order. The first post is the root and always carries a slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ThreadSnapshot {
    posts: Vec<PostRecord>,
}

impl ThreadSnapshot {
    /// Builds a snapshot, enforcing the same rules as a decoded thread.
    pub(crate) fn new(posts: Vec<PostRecord>) -> FetchResult<Self> {
        let root = posts
            .first()
            .ok_or_else(|| FetchError::Schema("thread has no posts".to_string()))?;
        match root.semantic_slug() {
            Some(slug) if is_safe_segment(slug) => {}
            Some(slug) => {
                return Err(FetchError::Schema(format!(
                    "root post semantic_url \"{}\" is not usable as a directory name",
                    slug
                )));
            }
            None => {
                return Err(FetchError::Schema(
                    "root post has no semantic_url".to_string(),
                ));
            }
        }

        Ok(Self { posts })
    }

    pub(crate) fn posts(&self) -> &[PostRecord] {
        &self.posts
    }

    pub(crate) fn root(&self) -> &PostRecord {
        // non-empty by construction
        &self.posts[0]
    }

    pub(crate) fn slug(&self) -> &str {
        self.root().semantic_slug().unwrap_or_default()
    }

    pub(crate) fn attachment_count(&self) -> usize {
        self.posts.iter().filter(|p| p.attachment().is_some()).count()
    }
}

/// Any malformed post rejects the whole thread: a bad reply here is a schema
/// error, not a per-attachment failure to log and skip.
impl TryFrom<ThreadDto> for ThreadSnapshot {
    type Error = FetchError;

    fn try_from(dto: ThreadDto) -> FetchResult<Self> {
        let mut posts = Vec::with_capacity(dto.posts.len());
        for (index, post) in dto.posts.into_iter().enumerate() {
            let attachment = if post.ext.is_empty() {
                None
            } else {
                if post.ext.contains(['/', '\\']) {
                    return Err(FetchError::Schema(format!(
                        "post [{}] has an invalid extension \"{}\"",
                        index, post.ext
                    )));
                }
                let tim = post.tim.ok_or_else(|| {
                    FetchError::Schema(format!("post [{}] has an extension but no tim", index))
                })?;
                Some(Attachment::new(tim, post.ext))
            };
            let slug = post.semantic_url.filter(|s| !s.is_empty());
            posts.push(PostRecord::new(post.filename, attachment, slug));
        }

        ThreadSnapshot::new(posts)
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

/// Decodes a `{thread}.json` body into a validated snapshot.
pub(crate) fn parse_thread(body: &[u8]) -> FetchResult<ThreadSnapshot> {
    let dto: ThreadDto = serde_json::from_slice(body)?;
    ThreadSnapshot::try_from(dto)
}

/// Retrieves thread pages and their post lists.
#[derive(Debug, Clone)]
pub(crate) struct ThreadFetcher {
    client: Client,
}

impl ThreadFetcher {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Checks that the thread page itself answers with 200.
    #[instrument(skip(self, locator), fields(thread = %locator))]
    pub(crate) async fn probe(&self, locator: &ThreadLocator) -> FetchResult<()> {
        let url = locator.page_url();
        let response = self.get_ok(url).await?;
        debug!("Thread page {} answered {}", url, response.status());
        Ok(())
    }

    /// Downloads and validates the thread's post list.
    #[instrument(skip(self, locator), fields(thread = %locator))]
    pub(crate) async fn fetch(&self, locator: &ThreadLocator) -> FetchResult<ThreadSnapshot> {
        let url = locator.metadata_url();
        let response = self.get_ok(&url).await?;
        let body = response.bytes().await.map_err(|source| FetchError::Body {
            url: url.clone(),
            source,
        })?;

        let snapshot = parse_thread(&body)?;
        info!(
            "Fetched {} posts ({} attachments) from {}",
            snapshot.posts().len(),
            snapshot.attachment_count(),
            url
        );
        Ok(snapshot)
    }

    async fn get_ok(&self, url: &str) -> FetchResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const THREAD_JSON: &str = r#"{
        "posts": [
            {"no": 1, "semantic_url": "abc", "com": "root post"},
            {"no": 2, "filename": "cat", "ext": ".jpg", "tim": 111, "w": 800},
            {"no": 3, "filename": "dog", "ext": ".png", "tim": 222}
        ]
    }"#;

    fn locator_for(server: &MockServer) -> ThreadLocator {
        ThreadLocator::parse(&format!("{}/g/thread/123", server.uri())).unwrap()
    }

    #[test]
    fn test_parse_thread_ignores_unknown_fields() {
        let snapshot = parse_thread(THREAD_JSON.as_bytes()).unwrap();

        assert_eq!(snapshot.posts().len(), 3);
        assert_eq!(snapshot.slug(), "abc");
        assert_eq!(snapshot.attachment_count(), 2);
        assert!(snapshot.root().attachment().is_none());

        let second = &snapshot.posts()[1];
        assert_eq!(second.original_filename(), "cat");
        assert_eq!(second.attachment(), Some(&Attachment::new(111, ".jpg")));
        assert_eq!(second.attachment().unwrap().file_name(), "111.jpg");
    }

    #[test]
    fn test_parse_thread_rejects_empty_thread() {
        let result = parse_thread(br#"{"posts": []}"#);
        assert!(matches!(result, Err(FetchError::Schema(_))));
    }

    #[test]
    fn test_parse_thread_rejects_missing_or_unsafe_slug() {
        assert!(matches!(
            parse_thread(br#"{"posts": [{"ext": ".jpg", "tim": 1}]}"#),
            Err(FetchError::Schema(_))
        ));
        assert!(matches!(
            parse_thread(br#"{"posts": [{"semantic_url": ""}]}"#),
            Err(FetchError::Schema(_))
        ));
        assert!(matches!(
            parse_thread(br#"{"posts": [{"semantic_url": "../etc"}]}"#),
            Err(FetchError::Schema(_))
        ));
        assert!(matches!(
            parse_thread(br#"{"posts": [{"semantic_url": ".."}]}"#),
            Err(FetchError::Schema(_))
        ));
    }

    #[test]
    fn test_parse_thread_requires_tim_for_attachments() {
        let result = parse_thread(br#"{"posts": [{"semantic_url": "a"}, {"ext": ".gif"}]}"#);
        assert!(matches!(result, Err(FetchError::Schema(_))));

        let result =
            parse_thread(br#"{"posts": [{"semantic_url": "a"}, {"ext": "/../x", "tim": 5}]}"#);
        assert!(matches!(result, Err(FetchError::Schema(_))));
    }

    #[test]
    fn test_parse_thread_rejects_malformed_json() {
        assert!(matches!(parse_thread(b"<html>"), Err(FetchError::Json(_))));
        assert!(matches!(
            parse_thread(br#"{"posts": [{"tim": "soon"}]}"#),
            Err(FetchError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/g/thread/123.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(THREAD_JSON))
            .mount(&mock_server)
            .await;

        let fetcher = ThreadFetcher::new(Client::new());
        let snapshot = fetcher.fetch(&locator_for(&mock_server)).await.unwrap();

        assert_eq!(snapshot.slug(), "abc");
        assert_eq!(snapshot.attachment_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_non_200_is_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/g/thread/123.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = ThreadFetcher::new(Client::new());
        let result = fetcher.fetch(&locator_for(&mock_server)).await;

        match result {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_body_is_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/g/thread/123.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let fetcher = ThreadFetcher::new(Client::new());
        let result = fetcher.fetch(&locator_for(&mock_server)).await;
        assert!(matches!(result, Err(FetchError::Json(_))));
    }

    #[tokio::test]
    async fn test_probe_checks_thread_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/g/thread/123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;

        let fetcher = ThreadFetcher::new(Client::new());
        fetcher.probe(&locator_for(&mock_server)).await.unwrap();

        let banned = ThreadLocator::parse(&format!("{}/g/thread/999", mock_server.uri())).unwrap();
        assert!(matches!(
            fetcher.probe(&banned).await,
            Err(FetchError::Status { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_fatal() {
        // bind then release a port so nothing is listening on it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let locator = ThreadLocator::parse(&format!("http://127.0.0.1:{}/g/thread/1", port)).unwrap();

        let fetcher = ThreadFetcher::new(Client::new());
        assert!(matches!(
            fetcher.fetch(&locator).await,
            Err(FetchError::Request { .. })
        ));
    }
}
