use super::html::{clean_html, rewrite_urls, select_first, visible_text, Selector};
use reqwest::header::{HeaderMap, HeaderValue};

/// Case-insensitive phrases that mark a fetched page as an error page even
/// when the HTTP status was 200.
const ERROR_INDICATORS: &[&str] = &[
    "access denied",
    "forbidden",
    "not found",
    "page not found",
    "404",
    "403",
    "401",
];

/// Primary content selectors, most specific first. Tried in order when no
/// readability hook is installed (or it declines the document).
const PRIMARY_SELECTORS: &[Selector] = &[
    Selector::Tag("main"),
    Selector::Tag("article"),
    Selector::Class("content"),
    Selector::Class("post-content"),
    Selector::Class("entry-content"),
    Selector::Class("article-content"),
    Selector::Class("full-text"),
];

/// Second-chance selectors for sites with non-standard content containers.
const SECONDARY_SELECTORS: &[Selector] = &[
    Selector::Class("article-body"),
    Selector::Class("article-text"),
    Selector::Class("fulltext"),
    Selector::Class("full-text"),
    Selector::Class("content-body"),
    Selector::Class("main-content"),
    Selector::TagAttr("section", "role", "main"),
    Selector::Class("article"),
];

/// One-shot URL transform tried when the primary fetch comes back empty or
/// as an error page. Pluggable so publisher-specific quirks stay data, not
/// code.
#[derive(Debug, Clone)]
pub struct FallbackRule {
    /// Substring the page URL must contain for the rule to apply.
    pub url_contains: String,
    /// Path fragment to replace.
    pub find: String,
    /// Replacement fragment.
    pub replace_with: String,
}

impl FallbackRule {
    pub fn applies(&self, url: &str) -> bool {
        url.contains(&self.url_contains) && url.contains(&self.find)
    }

    pub fn apply(&self, url: &str) -> String {
        url.replace(&self.find, &self.replace_with)
    }
}

/// The one publisher quirk shipped by default: SAGE journal full-text pages
/// reject non-subscriber fetches, but the abstract variant of the same URL
/// serves content.
pub fn default_fallback_rules() -> Vec<FallbackRule> {
    vec![FallbackRule {
        url_contains: "journals.sagepub.com".to_string(),
        find: "/doi/full/".to_string(),
        replace_with: "/doi/abs/".to_string(),
    }]
}

/// Optional readability-style extractor supplied by the host. Receives the
/// raw document, returns the primary content fragment or `None` to decline.
pub type ReadabilityFn = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Fetches remote article pages and extracts their readable content.
///
/// Every failure mode — network errors, error pages, empty bodies — yields
/// empty content rather than an error; the caller falls back to the
/// feed-supplied summary.
pub struct ContentExtractor {
    client: reqwest::Client,
    fallback_rules: Vec<FallbackRule>,
    readability: Option<Box<ReadabilityFn>>,
}

impl ContentExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            fallback_rules: default_fallback_rules(),
            readability: None,
        }
    }

    /// Replace the fallback URL transform list.
    pub fn with_fallback_rules(mut self, rules: Vec<FallbackRule>) -> Self {
        self.fallback_rules = rules;
        self
    }

    /// Install a readability-style main-content extractor. The structural
    /// selector chain remains as fallback when the hook declines.
    pub fn with_readability(
        mut self,
        f: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.readability = Some(Box::new(f));
        self
    }

    /// Fetch `url` and return its readable content as an HTML fragment with
    /// absolutized URLs, or an empty string when nothing could be extracted.
    pub async fn fetch_full_content(&self, url: &str) -> String {
        let body = match self.get(url).await {
            Some(b) if !b.trim().is_empty() => b,
            _ => {
                // Empty or failed fetch: one shot at a known fallback variant
                let Some(fallback_url) = self.fallback_url(url) else {
                    return String::new();
                };
                tracing::debug!(url = %url, fallback = %fallback_url, "Empty body, trying fallback URL");
                match self.get(&fallback_url).await {
                    Some(b) if !b.trim().is_empty() && !looks_like_error_page(&b) => {
                        return self.extract(&b, &fallback_url);
                    }
                    _ => return String::new(),
                }
            }
        };

        if looks_like_error_page(&body) {
            let Some(fallback_url) = self.fallback_url(url) else {
                tracing::debug!(url = %url, "Error page with no applicable fallback");
                return String::new();
            };
            tracing::debug!(url = %url, fallback = %fallback_url, "Error page, trying fallback URL");
            return match self.get(&fallback_url).await {
                Some(b) if !b.trim().is_empty() && !looks_like_error_page(&b) => {
                    self.extract(&b, &fallback_url)
                }
                _ => String::new(),
            };
        }

        self.extract(&body, url)
    }

    async fn get(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).headers(browser_headers()).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Content fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(url = %url, status = %response.status(), "Content fetch returned error status");
            return None;
        }
        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Content body read failed");
                None
            }
        }
    }

    fn fallback_url(&self, url: &str) -> Option<String> {
        self.fallback_rules
            .iter()
            .find(|r| r.applies(url))
            .map(|r| r.apply(url))
    }

    /// Pull the primary content out of a fetched document and rewrite its
    /// URLs against the page URL.
    fn extract(&self, body: &str, url: &str) -> String {
        if let Some(readability) = &self.readability {
            if let Some(content) = readability(body) {
                return rewrite_urls(&content, url);
            }
        }

        let cleaned = clean_html(body);
        for selector in PRIMARY_SELECTORS.iter().chain(SECONDARY_SELECTORS) {
            if let Some(fragment) = select_first(&cleaned, *selector) {
                return rewrite_urls(&fragment, url);
            }
        }

        // Last resort: the whole body element, or the document as-is
        let fallback = select_first(&cleaned, Selector::Tag("body")).unwrap_or(cleaned);
        rewrite_urls(&fallback, url)
    }
}

fn looks_like_error_page(body: &str) -> bool {
    let text = visible_text(body).to_lowercase();
    ERROR_INDICATORS.iter().any(|ind| text.contains(ind))
}

/// Header set mimicking a desktop browser; some publishers reject obvious
/// non-browser user agents.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        ),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert(
        reqwest::header::CONNECTION,
        HeaderValue::from_static("keep-alive"),
    );
    headers.insert(
        "Upgrade-Insecure-Requests",
        HeaderValue::from_static("1"),
    );
    headers
}
