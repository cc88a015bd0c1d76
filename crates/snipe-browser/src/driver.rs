//! The interactive-session capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum BrowserError {
    /// The requested element is not on the current page. Callers treat this
    /// as a normal condition (e.g. a registration control that is locked).
    #[error("no element matching '{0}'")]
    NoSuchElement(String),

    #[error("no alert present")]
    NoAlert,

    #[error("webdriver failure: {0}")]
    WebDriver(String),

    #[error("http failure: {0}")]
    Http(#[from] reqwest::Error),
}

/// One captured session cookie, independent of any automation product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

/// Mutating operations on the single interactive session.
///
/// The underlying automation resource is not safe for concurrent mutation,
/// so implementations are held exclusively (`&mut`) by the owning task and
/// never handed to pool workers; workers read through [`crate::PageFetcher`]
/// instead.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    async fn page_source(&self) -> Result<String, BrowserError>;

    /// Type into the first element matching the CSS selector.
    async fn type_into(&mut self, css: &str, text: &str) -> Result<(), BrowserError>;

    /// Click the first element matching the CSS selector.
    async fn click(&mut self, css: &str) -> Result<(), BrowserError>;

    /// Click the `index`-th (0-based) element matching the CSS selector.
    async fn click_nth(&mut self, css: &str, index: usize) -> Result<(), BrowserError>;

    /// Text content of the first element matching the CSS selector, or
    /// `None` when absent. Used for probing optional page markers.
    async fn text_of(&self, css: &str) -> Result<Option<String>, BrowserError>;

    async fn accept_alert(&mut self) -> Result<(), BrowserError>;

    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError>;

    async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError>;

    /// Tear the session down. Idempotent.
    async fn quit(&mut self) -> Result<(), BrowserError>;
}
