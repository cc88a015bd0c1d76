//! Stateless authenticated reads.
//!
//! Pool workers never touch the interactive session; they issue plain GETs
//! that ride on a snapshot of its cookies. The header set mimics a desktop
//! browser since the site rejects obviously non-browser clients.

use crate::driver::{BrowserError, Cookie};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::RwLock;
use std::time::Duration;

/// Read capability over the external listing. Implementations must be safe
/// to share across pool workers.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET the student-link entry point with the given query parameters and
    /// return the raw page body.
    async fn fetch(&self, params: &[(String, String)]) -> Result<String, BrowserError>;

    /// Replace the captured auth cookies after a (re)login. Default no-op
    /// for fetchers that carry no session state.
    fn refresh_cookies(&self, _cookies: &[Cookie]) {}
}

/// [`PageFetcher`] backed by reqwest and the session's captured cookies.
pub struct PageReader {
    client: reqwest::Client,
    base_url: String,
    cookie_header: RwLock<String>,
}

impl PageReader {
    pub fn new(base_url: impl Into<String>, cookies: &[Cookie]) -> Result<Self, BrowserError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .default_headers(browser_headers())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            cookie_header: RwLock::new(cookie_header(cookies)),
        })
    }
}

#[async_trait]
impl PageFetcher for PageReader {
    async fn fetch(&self, params: &[(String, String)]) -> Result<String, BrowserError> {
        let cookie = self.cookie_header.read().expect("cookie lock poisoned").clone();
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .header("Cookie", cookie)
            .send()
            .await?;
        Ok(response.text().await?)
    }

    fn refresh_cookies(&self, cookies: &[Cookie]) {
        *self.cookie_header.write().expect("cookie lock poisoned") = cookie_header(cookies);
    }
}

fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    let header_list = [
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("accept-language", "en-US,en;q=0.9"),
        ("cache-control", "no-cache"),
        ("pragma", "no-cache"),
        ("connection", "keep-alive"),
        ("upgrade-insecure-requests", "1"),
        (
            "user-agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/118.0.0.0 Safari/537.36",
        ),
    ];
    for (name, value) in header_list {
        if let (Ok(h_name), Ok(h_value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(h_name, h_value);
        }
    }
    headers
}
