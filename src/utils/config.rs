use crate::parser::types::{BrowserKind, SuiteHeader};
use log::warn;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Browser engine to launch
    pub browser: BrowserKind,

    /// Run without a visible window
    pub headless: bool,

    /// Prefix for relative `navigate` URLs
    pub base_url: Option<String>,

    /// CDP endpoint to attach to an existing chromium (e.g. http://localhost:9222)
    pub cdp_endpoint: Option<String>,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Per-step timeout (ms)
    pub step_timeout_ms: u64,

    /// Capture a screenshot whenever a step fails
    pub screenshot_on_failure: bool,

    /// Directory for screenshots and the screenshot manifest
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chromium,
            headless: false,
            base_url: None,
            cdp_endpoint: None,
            viewport_width: 1280,
            viewport_height: 720,
            step_timeout_ms: 10000,
            screenshot_on_failure: true,
            output_dir: PathBuf::from("./output"),
        }
    }
}

impl Config {
    /// Defaults overlaid with `LUMI_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("LUMI_HEADLESS") {
            self.headless = v == "true" || v == "1";
        }
        if let Some(v) = var("LUMI_BROWSER") {
            match BrowserKind::parse(&v) {
                Some(kind) => self.browser = kind,
                None => warn!("Ignoring unknown LUMI_BROWSER value: {}", v),
            }
        }
        if let Some(v) = var("LUMI_BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = var("LUMI_CDP_ENDPOINT") {
            self.cdp_endpoint = Some(v);
        }
    }

    /// Apply settings from a suite file header
    pub fn apply_header(&mut self, header: &SuiteHeader) {
        if let Some(ref b) = header.browser {
            match BrowserKind::parse(b) {
                Some(kind) => self.browser = kind,
                None => warn!("Ignoring unknown browser in suite header: {}", b),
            }
        }
        if let Some(headless) = header.headless {
            self.headless = headless;
        }
        if let Some(ref url) = header.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(timeout) = header.timeout_ms {
            self.step_timeout_ms = timeout;
        }
        if let Some(enabled) = header.screenshot_on_failure {
            self.screenshot_on_failure = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("LUMI_HEADLESS", "1"),
            ("LUMI_BROWSER", "firefox"),
            ("LUMI_BASE_URL", "http://localhost:8080"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert!(config.headless);
        assert_eq!(config.browser, BrowserKind::Firefox);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert!(config.cdp_endpoint.is_none());
    }

    #[test]
    fn test_header_overrides_env() {
        let mut config = Config::default();
        config.headless = true;
        config.apply_header(&SuiteHeader {
            browser: Some("webkit".to_string()),
            headless: Some(false),
            timeout_ms: Some(2500),
            screenshot_on_failure: Some(false),
            ..SuiteHeader::default()
        });

        assert_eq!(config.browser, BrowserKind::Webkit);
        assert!(!config.headless);
        assert_eq!(config.step_timeout_ms, 2500);
        assert!(!config.screenshot_on_failure);
    }

    #[test]
    fn test_unknown_browser_keeps_previous() {
        let mut config = Config::default();
        config.apply_header(&SuiteHeader {
            browser: Some("netscape".to_string()),
            ..SuiteHeader::default()
        });
        assert_eq!(config.browser, BrowserKind::Chromium);
    }
}
