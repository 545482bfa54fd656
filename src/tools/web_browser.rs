use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::errors::{ToolError, ToolResult};
use crate::tool::Tool;

pub const WEB_BROWSER_TOOL: &str = "web_browser";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CHARS: usize = 4000;

lazy_static! {
    static ref HIDDEN: Regex =
        Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<!--.*?-->")
            .unwrap();
    static ref BLOCK: Regex = Regex::new(
        r"(?i)</?(p|div|br|hr|h[1-6]|li|ul|ol|tr|table|section|article|header|footer|nav|main|aside|blockquote|pre|title)\b[^>]*>"
    )
    .unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref SPACES: Regex = Regex::new(r"[ \t\x{a0}]+").unwrap();
}

#[derive(Debug, Clone)]
pub struct WebBrowserConfig {
    pub timeout: Duration,
    pub max_chars: usize,
    pub user_agent: String,
}

impl Default for WebBrowserConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_chars: DEFAULT_MAX_CHARS,
            user_agent: format!("chatline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl WebBrowserConfig {
    /// Defaults, overridden by `CHATLINE_FETCH_TIMEOUT_SECS` and
    /// `CHATLINE_FETCH_MAX_CHARS` when set to valid numbers.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_number("CHATLINE_FETCH_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(chars) = env_number("CHATLINE_FETCH_MAX_CHARS") {
            config.max_chars = chars as usize;
        }
        config
    }
}

fn env_number(key: &str) -> Option<u64> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring non-numeric setting");
            None
        }
    }
}

/// Fetches a web page and returns its text, so the model can read it.
pub struct WebBrowser {
    client: Client,
    config: WebBrowserConfig,
}

impl WebBrowser {
    pub fn new(config: WebBrowserConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch(&self, url: Url) -> ToolResult<String> {
        debug!(%url, "fetching page");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::RequestFailed(format!("timed out after {:?}", self.config.timeout))
            } else {
                ToolError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/plain")
            .to_ascii_lowercase();
        if !is_textual(&content_type) {
            return Err(ToolError::UnsupportedContent(content_type));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::RequestFailed(e.to_string()))?;

        let text = if content_type.contains("html") {
            html_to_text(&body)
        } else {
            body.trim().to_string()
        };

        Ok(truncate(&text, self.config.max_chars))
    }
}

#[async_trait]
impl Tool for WebBrowser {
    fn name(&self) -> &str {
        WEB_BROWSER_TOOL
    }

    fn description(&self) -> &str {
        "Fetches a website (for example weather.com) and returns the text on the page"
    }

    async fn invoke(&self, argument: &str) -> ToolResult<String> {
        let url = normalize_url(argument)?;
        self.fetch(url).await
    }
}

/// Turn a domain-like argument into a URL, assuming https when no scheme is given.
pub fn normalize_url(target: &str) -> ToolResult<Url> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ToolError::InvalidArgument("missing website".to_string()));
    }

    let candidate = if target.contains("://") {
        target.to_string()
    } else {
        format!("https://{}", target)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ToolError::InvalidArgument(format!("{}: {}", target, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(ToolError::InvalidArgument(format!("{}: missing host", target))),
        scheme => Err(ToolError::InvalidArgument(format!(
            "unsupported scheme '{}'",
            scheme
        ))),
    }
}

fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("json")
        || content_type.contains("xml")
}

/// Reduce an HTML document to readable lines of text.
pub fn html_to_text(html: &str) -> String {
    let visible = HIDDEN.replace_all(html, " ");
    let blocks = BLOCK.replace_all(&visible, "\n");
    let stripped = TAG.replace_all(&blocks, "");
    let decoded = decode_entities(&stripped);

    decoded
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tokio::net::TcpListener;

    fn browser(max_chars: usize) -> WebBrowser {
        WebBrowser::new(WebBrowserConfig {
            max_chars,
            ..WebBrowserConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("weather.com").unwrap().as_str(), "https://weather.com/");
        assert_eq!(
            normalize_url(" http://example.com/a?b=1 ").unwrap().as_str(),
            "http://example.com/a?b=1"
        );
        assert!(matches!(normalize_url(""), Err(ToolError::InvalidArgument(_))));
        assert!(matches!(
            normalize_url("ftp://example.com"),
            Err(ToolError::InvalidArgument(_))
        ));
        assert!(matches!(
            normalize_url("exa mple.com"),
            Err(ToolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_html_to_text() {
        let html = r#"<html><head><title>Forecast</title>
            <style>body { color: red; }</style>
            <script>var x = "<p>hidden</p>";</script></head>
            <body><h1>Today</h1><p>72F &amp; sunny</p><!-- note -->
            <ul><li>Low:   60F</li><li>High: 80F</li></ul></body></html>"#;

        assert_eq!(
            html_to_text(html),
            "Forecast\nToday\n72F & sunny\nLow: 60F\nHigh: 80F"
        );
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("caf\u{e9} au lait", 4), "caf\u{e9}\n[truncated]");
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/forecast")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><body><p>72F sunny</p></body></html>")
            .create_async()
            .await;

        let text = browser(4000)
            .invoke(&format!("{}/forecast", server.url()))
            .await
            .unwrap();

        assert_eq!(text, "72F sunny");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_truncates_long_pages() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/long")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("x".repeat(100))
            .create_async()
            .await;

        let text = browser(10)
            .invoke(&format!("{}/long", server.url()))
            .await
            .unwrap();

        assert_eq!(text, format!("{}\n[truncated]", "x".repeat(10)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_binary_content() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/logo.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body([0x89, b'P', b'N', b'G'])
            .create_async()
            .await;

        let err = browser(4000)
            .invoke(&format!("{}/logo.png", server.url()))
            .await
            .unwrap_err();

        assert_eq!(err, ToolError::UnsupportedContent("image/png".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_reports_http_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let err = browser(4000)
            .invoke(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        assert_eq!(err, ToolError::HttpStatus(404));
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let browser = WebBrowser::new(WebBrowserConfig {
            timeout: Duration::from_millis(200),
            ..WebBrowserConfig::default()
        })
        .unwrap();
        let err = browser
            .invoke(&format!("http://{}/slow", addr))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ToolError::RequestFailed("timed out after 200ms".to_string())
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_fetch_reports_refused_connection() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = browser(4000)
            .invoke(&format!("http://{}/", addr))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::RequestFailed(_)), "got {:?}", err);
    }
}
