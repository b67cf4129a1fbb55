//! DuckDuckGo HTML search backend.
//!
//! Uses the JavaScript-free results page, so no API key is needed.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::error::{CrawlerError, Result};
use crate::limits::USER_AGENT;
use crate::traits::searcher::{SearchResult, WebSearcher};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

pub struct DuckDuckGoSearcher {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for DuckDuckGoSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckDuckGoSearcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Point at a different results endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl WebSearcher for DuckDuckGoSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query)])
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(CrawlerError::search)?;

        if !response.status().is_success() {
            return Err(CrawlerError::search(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("DuckDuckGo returned {}", response.status()),
            )));
        }

        let body = response.text().await.map_err(CrawlerError::search)?;
        let results = parse_results(&body, max_results);

        debug!(query = %query, count = results.len(), "DuckDuckGo search complete");
        Ok(results)
    }
}

/// Parse a results page into at most `max_results` hits, in rank order.
pub fn parse_results(body: &str, max_results: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(body);
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return vec![];
    };

    let mut results: Vec<SearchResult> = Vec::new();
    for result in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }

        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(unwrap_redirect) else {
            continue;
        };
        if results.iter().any(|r| r.url == url) {
            continue;
        }

        let title = collapse(link.text());
        let mut hit = SearchResult::new(url).with_title(title);
        if let Some(snippet) = result.select(&snippet_sel).next() {
            hit = hit.with_snippet(collapse(snippet.text()));
        }
        results.push(hit);
    }

    results
}

/// Result links point at a redirector carrying the target in `uddg`.
fn unwrap_redirect(href: &str) -> Option<Url> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    let target = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .and_then(|(_, value)| Url::parse(&value).ok())
        .unwrap_or(url);

    matches!(target.scheme(), "http" | "https").then_some(target)
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fpizza.example%2Freviews&amp;rut=abc">Pizza   <b>Reviews</b></a>
            <a class="result__snippet">Read what   guests say</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://direct.example/page">Direct</a>
          </div>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fpizza.example%2Freviews">Duplicate</a>
          </div>
          <div class="result">
            <a class="result__a" href="javascript:void(0)">Broken</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://third.example/">Third</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_results_unwraps_redirects() {
        let results = parse_results(RESULTS_PAGE, 10);
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();

        assert_eq!(
            urls,
            [
                "https://pizza.example/reviews",
                "https://direct.example/page",
                "https://third.example/"
            ]
        );
        assert_eq!(results[0].title.as_deref(), Some("Pizza Reviews"));
        assert_eq!(results[0].snippet.as_deref(), Some("Read what guests say"));
        assert_eq!(results[1].snippet, None);
    }

    #[test]
    fn test_parse_results_respects_limit() {
        assert_eq!(parse_results(RESULTS_PAGE, 1).len(), 1);
        assert!(parse_results(RESULTS_PAGE, 0).is_empty());
        assert!(parse_results("<html></html>", 5).is_empty());
    }

    #[tokio::test]
    async fn test_search_posts_query_form() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/html/", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // Headers and the short form body arrive together or in a few reads
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if n == 0 || text.contains("q=pizza+naples") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                RESULTS_PAGE.len(),
                RESULTS_PAGE
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        let searcher = DuckDuckGoSearcher::new().with_endpoint(endpoint);
        let results = searcher.search("pizza naples", 5).await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /html/ "));
        assert!(request.contains("application/x-www-form-urlencoded"));
        assert!(request.contains("q=pizza+naples"));
        assert_eq!(results.len(), 3);
    }
}
