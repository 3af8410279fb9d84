use crate::model::{Feed, Item, MediaType};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the feed fetch operation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Feed body could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result of fetching one remote feed: a title (when the feed declares one),
/// the feed's media type, and its items in feed order.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub title: Option<String>,
    pub media_type: MediaType,
    pub items: Vec<Item>,
}

/// The external fetch-and-parse operation the import engine consumes.
///
/// `existing` carries the currently registered feed so implementations can
/// preserve feed-level attributes (e.g. media type) across refreshes.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str, existing: Option<&Feed>) -> Result<FetchedFeed, FetchError>;
}

/// Production fetcher: one GET, parse with feed-rs, map entries to items.
///
/// Deliberately thin — no retries and no timeout beyond what the injected
/// client is configured with. Import failures are recorded on the queue
/// entry and retried manually, never automatically.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str, existing: Option<&Feed>) -> Result<FetchedFeed, FetchError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;

        let parsed =
            feed_rs::parser::parse(bytes.as_ref()).map_err(|e| FetchError::Parse(e.to_string()))?;

        let feed_title = parsed.title.map(|t| t.content);
        let media_type = existing.map(|f| f.media_type).unwrap_or_default();

        let items = parsed
            .entries
            .into_iter()
            .map(|entry| {
                let summary = entry.summary.map(|t| t.content);
                let description = entry
                    .content
                    .and_then(|c| c.body)
                    .or_else(|| summary.clone())
                    .unwrap_or_default();
                Item {
                    guid: entry.id,
                    feed_url: url.to_string(),
                    feed_title: feed_title.clone().unwrap_or_default(),
                    title: entry
                        .title
                        .map(|t| t.content)
                        .unwrap_or_else(|| "(untitled)".to_string()),
                    link: entry
                        .links
                        .first()
                        .map(|l| l.href.clone())
                        .unwrap_or_default(),
                    description,
                    summary,
                    author: entry.authors.first().map(|p| p.name.clone()),
                    pub_date: entry.published.or(entry.updated),
                    media_type,
                    video_id: None,
                    audio_url: None,
                    read: false,
                    starred: false,
                    saved: false,
                    saved_file_path: None,
                    tags: Vec::new(),
                }
            })
            .collect();

        Ok(FetchedFeed {
            title: feed_title,
            media_type,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example Blog</title>
    <item>
        <guid>post-1</guid>
        <title>First Post</title>
        <link>https://example.com/first</link>
        <description>Hello world</description>
    </item>
    <item>
        <guid>post-2</guid>
        <title>Second Post</title>
        <link>https://example.com/second</link>
    </item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFeedFetcher::new(reqwest::Client::new());
        let url = format!("{}/feed", server.uri());
        let fetched = fetcher.fetch(&url, None).await.unwrap();

        assert_eq!(fetched.title.as_deref(), Some("Example Blog"));
        assert_eq!(fetched.items.len(), 2);
        assert_eq!(fetched.items[0].guid, "post-1");
        assert_eq!(fetched.items[0].feed_url, url);
        assert_eq!(fetched.items[0].feed_title, "Example Blog");
        assert_eq!(fetched.items[0].link, "https://example.com/first");
        assert!(!fetched.items[0].saved);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFeedFetcher::new(reqwest::Client::new());
        let err = fetcher
            .fetch(&format!("{}/feed", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn test_fetch_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not a feed"))
            .mount(&server)
            .await;

        let fetcher = HttpFeedFetcher::new(reqwest::Client::new());
        let err = fetcher
            .fetch(&format!("{}/feed", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_media_type_carried_from_existing_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&server)
            .await;

        let mut existing = Feed::empty("Pod", "url", "");
        existing.media_type = MediaType::Podcast;

        let fetcher = HttpFeedFetcher::new(reqwest::Client::new());
        let fetched = fetcher
            .fetch(&format!("{}/feed", server.uri()), Some(&existing))
            .await
            .unwrap();
        assert_eq!(fetched.media_type, MediaType::Podcast);
        assert!(fetched
            .items
            .iter()
            .all(|i| i.media_type == MediaType::Podcast));
    }
}
