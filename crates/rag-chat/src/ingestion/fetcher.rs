//! Web page fetching and main-content extraction

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::FileType;

use super::parser::{is_inside, page_title, visible_lines, PageContent, ParsedDocument};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Page chrome that never holds the article text
const BOILERPLATE_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "head"];

/// Tried in order; the first match outside boilerplate is the main content
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".content",
    "#content",
    ".main",
    "#main",
    ".post",
    ".entry",
    ".article-content",
    ".page-content",
];

const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to size limit]";

/// Fetches web pages and reduces them to readable text
pub struct UrlFetcher {
    client: Client,
    timeout: Duration,
    max_chars: usize,
}

impl UrlFetcher {
    pub fn new(timeout: Duration, max_chars: usize) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            max_chars,
        })
    }

    /// Check that `url` is an absolute http(s) URL
    pub fn validate_url(url: &str) -> Result<()> {
        let url = url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat(format!(
                "URL must start with http:// or https://, got '{}'",
                url
            )))
        }
    }

    /// Download a page and extract its main text
    pub async fn fetch(&self, url: &str) -> Result<ParsedDocument> {
        Self::validate_url(url)?;
        tracing::info!(url, "Fetching web page");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(format!("fetch {}", url), self.timeout)
            } else {
                Error::fetch(url, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("server returned {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            tracing::warn!(url, content_type = %content_type, "Content may not be HTML, parsing anyway");
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(url, format!("failed to read body: {}", e)))?;

        let parsed = extract_page(url, &body, self.max_chars);
        if parsed.is_empty() {
            return Err(Error::EmptyDocument(url.to_string()));
        }
        Ok(parsed)
    }
}

/// Reduce an HTML page to its main text, prefixed with its origin
pub fn extract_page(url: &str, html: &str, max_chars: usize) -> ParsedDocument {
    let document = Html::parse_document(html);
    let title = page_title(&document).unwrap_or_else(|| url.to_string());

    let main = CONTENT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .find(|el| !is_inside(*el, BOILERPLATE_TAGS))
        })
        .or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|s| document.select(&s).next())
        })
        .unwrap_or_else(|| document.root_element());

    let lines: Vec<String> = visible_lines(main, BOILERPLATE_TAGS)
        .into_iter()
        .flat_map(|block| {
            block
                .lines()
                .map(str::trim)
                .filter(|l| l.chars().count() > 2)
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect();

    let mut text = lines.join("\n");
    let text = if text.chars().count() > max_chars {
        tracing::info!(url, max_chars, "Truncating long web page");
        if let Some((cut, _)) = text.char_indices().nth(max_chars) {
            text.truncate(cut);
        }
        text.push_str(TRUNCATION_MARKER);
        text
    } else {
        text
    };

    // A page with no readable text stays empty so callers can reject it
    let content = if text.is_empty() {
        String::new()
    } else {
        format!("Content from {}:\n\n{}", url, text)
    };

    let mut parsed = ParsedDocument::from_pages(
        FileType::Url,
        title,
        vec![PageContent {
            page_number: None,
            estimated: false,
            content,
            char_offset: 0,
            paragraphs: Vec::new(),
        }],
        None,
    );
    parsed.url = Some(url.to_string());
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Shipping FAQ</title></head><body>
        <nav><a href="/">Home page link</a></nav>
        <header><h1>Site header</h1></header>
        <main>
          <h2>Delivery</h2>
          <p>Orders ship within two business days.</p>
          <p>ok</p>
          <script>track();</script>
        </main>
        <footer>Copyright footer</footer>
    </body></html>"#;

    #[test]
    fn test_extracts_main_content() {
        let parsed = extract_page("https://shop.example/faq", PAGE, 50_000);
        assert_eq!(parsed.title, "Shipping FAQ");
        assert_eq!(parsed.file_type, FileType::Url);
        assert_eq!(parsed.url.as_deref(), Some("https://shop.example/faq"));
        assert_eq!(
            parsed.content,
            "Content from https://shop.example/faq:\n\nDelivery\nOrders ship within two business days."
        );
    }

    #[test]
    fn test_falls_back_to_body_and_url_title() {
        let html = "<body><div>First paragraph of text</div><footer>Legal stuff</footer></body>";
        let parsed = extract_page("https://a.example", html, 50_000);
        assert_eq!(parsed.title, "https://a.example");
        assert!(parsed.content.ends_with("First paragraph of text"));
        assert!(!parsed.content.contains("Legal"));
    }

    #[test]
    fn test_truncates_long_pages() {
        let html = format!("<body><p>{}</p></body>", "x".repeat(200));
        let parsed = extract_page("https://a.example", &html, 50);
        assert!(parsed.content.ends_with(TRUNCATION_MARKER));
        assert!(parsed.content.contains(&"x".repeat(50)));
        assert!(!parsed.content.contains(&"x".repeat(51)));
    }

    #[test]
    fn test_empty_page_has_no_content() {
        let parsed = extract_page("https://a.example", "<body><script>x()</script></body>", 100);
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(UrlFetcher::validate_url("https://example.com").is_ok());
        assert!(UrlFetcher::validate_url("ftp://example.com").is_err());
        assert!(UrlFetcher::validate_url("example.com").is_err());
    }
}
