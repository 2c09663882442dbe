//! In-memory driver for unit tests.

use super::traits::{BrowserDriver, DriverFactory};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakePage {
    /// Selector -> visible text; selectors not listed do not exist
    pub elements: HashMap<String, String>,
    /// Every call made, in order
    pub calls: Vec<String>,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    pub page: Arc<Mutex<FakePage>>,
}

impl FakeDriver {
    pub fn with_elements(elements: &[(&str, &str)]) -> Self {
        let driver = Self::default();
        driver.page.lock().unwrap().elements = elements
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        driver
    }

    pub fn calls(&self) -> Vec<String> {
        self.page.lock().unwrap().calls.clone()
    }

    fn lookup(&self, call: String, selector: &str) -> Result<String> {
        let mut page = self.page.lock().unwrap();
        page.calls.push(call);
        page.elements
            .get(selector)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Element not found: {}", selector))
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.lock().unwrap().calls.push(format!("navigate {}", url));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.lookup(format!("click {}", selector), selector).map(|_| ())
    }

    async fn input(&self, selector: &str, text: &str) -> Result<()> {
        self.lookup(format!("input {} {}", selector, text), selector)
            .map(|_| ())
    }

    async fn text(&self, selector: &str) -> Result<String> {
        self.lookup(format!("text {}", selector), selector)
    }

    async fn wait_visible(&self, selector: &str, _timeout_ms: u64) -> Result<bool> {
        Ok(self
            .lookup(format!("wait {}", selector), selector)
            .is_ok())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .lock()
            .unwrap()
            .calls
            .push(format!("screenshot {}", path.display()));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        page.calls.push("close".to_string());
        page.closed = true;
        Ok(())
    }
}

/// Hands out clones of one driver, or fails every open
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub driver: FakeDriver,
    pub fail_open: bool,
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn BrowserDriver>> {
        if self.fail_open {
            anyhow::bail!("browser executable not found");
        }
        Ok(Box::new(self.driver.clone()))
    }
}
