use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Browser automation interface for one open session
///
/// Selectors are CSS selectors. Every method reports transport or lookup
/// problems as errors; callers decide whether they fail a step.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to a URL. Relative URLs resolve against the configured base URL.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Click the first element matching `selector`
    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the value of an input element
    async fn input(&self, selector: &str, text: &str) -> Result<()>;

    /// Visible text of the first element matching `selector`
    async fn text(&self, selector: &str) -> Result<String>;

    /// Wait until an element is visible
    ///
    /// # Returns
    /// `Ok(false)` if the element did not appear within `timeout_ms`
    async fn wait_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool>;

    /// Save a PNG screenshot of the page to `path`
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Tear the session down
    async fn close(&self) -> Result<()>;
}

/// Opens new browser sessions
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserDriver>>;
}
