//! Web driver implementation using Playwright
//!
//! Each opened session gets its own browser, context and page, so runs
//! never share cookies or navigation state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::driver::traits::{BrowserDriver, DriverFactory};
use crate::parser::types::BrowserKind;
use crate::utils::config::Config;

/// Web driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser: BrowserKind,
    pub headless: bool,
    pub base_url: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// CDP endpoint to connect to an existing browser (chromium only)
    pub cdp_endpoint: Option<String>,
}

impl WebDriverConfig {
    /// Whether sessions launch their own browser rather than attach to one.
    /// Attached browsers are left running when a session closes.
    pub fn launches_browser(&self) -> bool {
        !(self.browser == BrowserKind::Chromium && self.cdp_endpoint.is_some())
    }
}

impl From<&Config> for WebDriverConfig {
    fn from(config: &Config) -> Self {
        Self {
            browser: config.browser,
            headless: config.headless,
            base_url: config.base_url.clone(),
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            cdp_endpoint: config.cdp_endpoint.clone(),
        }
    }
}

/// Launches one Playwright browser per session
pub struct WebDriverFactory {
    playwright: Arc<Playwright>,
    config: WebDriverConfig,
}

impl WebDriverFactory {
    pub async fn new(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        Ok(Self {
            playwright: Arc::new(playwright),
            config,
        })
    }

    async fn launch(&self) -> Result<Browser> {
        let browser = match self.config.browser {
            BrowserKind::Chromium => {
                let chromium = self.playwright.chromium();
                if let Some(ref endpoint) = self.config.cdp_endpoint {
                    log::info!("Connecting to browser at {}", endpoint);
                    chromium
                        .connect_over_cdp_builder(endpoint)
                        .connect_over_cdp()
                        .await
                        .with_context(|| format!("Failed to connect to browser at {}", endpoint))?
                } else {
                    launch_chromium_browser(&chromium, &self.config).await?
                }
            }
            BrowserKind::Firefox => {
                self.playwright
                    .firefox()
                    .launcher()
                    .headless(self.config.headless)
                    .launch()
                    .await?
            }
            BrowserKind::Webkit => {
                self.playwright
                    .webkit()
                    .launcher()
                    .headless(self.config.headless)
                    .launch()
                    .await?
            }
        };
        Ok(browser)
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn open(&self) -> Result<Box<dyn BrowserDriver>> {
        let browser = self.launch().await?;
        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;

        page.set_viewport_size(Viewport {
            width: self.config.viewport_width as i32,
            height: self.config.viewport_height as i32,
        })
        .await?;

        Ok(Box::new(WebDriver {
            browser,
            context,
            page: Mutex::new(page),
            base_url: self.config.base_url.clone(),
            owns_browser: self.config.launches_browser(),
        }))
    }
}

/// One browser session driven through Playwright
pub struct WebDriver {
    browser: Browser,
    context: BrowserContext,
    page: Mutex<Page>,
    base_url: Option<String>,
    owns_browser: bool,
}

impl WebDriver {
    fn resolve_url(&self, url: &str) -> String {
        resolve_url(self.base_url.as_deref(), url)
    }
}

/// Join a relative URL onto the base URL, if there is one
fn resolve_url(base_url: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("about:") {
        return url.to_string();
    }
    match base_url {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        None => url.to_string(),
    }
}

#[async_trait]
impl BrowserDriver for WebDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        let full_url = self.resolve_url(url);
        page.goto_builder(&full_url)
            .goto()
            .await
            .with_context(|| format!("Failed to navigate to {}", full_url))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.click_builder(selector)
            .click()
            .await
            .with_context(|| format!("Failed to click {}", selector))?;
        Ok(())
    }

    async fn input(&self, selector: &str, text: &str) -> Result<()> {
        let page = self.page.lock().await;
        let element = page
            .query_selector(selector)
            .await?
            .with_context(|| format!("Element not found: {}", selector))?;
        element.fill_builder(text).fill().await?;
        Ok(())
    }

    async fn text(&self, selector: &str) -> Result<String> {
        let page = self.page.lock().await;
        // Inputs report their value, everything else its rendered text
        let js = "el => el.value || el.innerText || el.textContent || ''";
        let text = page
            .evaluate_on_selector::<String, _>(selector, js, None::<String>)
            .await
            .with_context(|| format!("Element not found: {}", selector))?;
        Ok(text)
    }

    async fn wait_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let page = self.page.lock().await;
        let result = page
            .wait_for_selector_builder(selector)
            .timeout(timeout_ms as f64)
            .wait_for_selector()
            .await;
        Ok(result.is_ok())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let page = self.page.lock().await;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        page.screenshot_builder()
            .path(path.to_path_buf())
            .screenshot()
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.context
            .close()
            .await
            .context("Failed to close browser context")?;
        if self.owns_browser {
            self.browser
                .close()
                .await
                .context("Failed to close browser")?;
        }
        Ok(())
    }
}

async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(std::path::PathBuf::from);
    let system_path = find_system_browser();

    if let Some(ref path) = env_path {
        log::info!("Using browser from env: {}", path.display());
        launcher = launcher.executable(path);
    } else if let Some(ref path) = system_path {
        log::info!("Using discovered browser: {}", path.display());
        launcher = launcher.executable(path);
    } else {
        log::warn!("No browser executable found, falling back to Playwright's bundled chromium");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
}
