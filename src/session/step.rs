//! Executes one step against an open browser session.

use crate::driver::BrowserDriver;
use crate::parser::types::{Step, StepAction};
use crate::runner::state::DispatchKey;
use crate::runner::summary::{Expectation, StepResult};
use crate::utils::config::Config;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-step execution settings
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Screenshots land under `<output_dir>/screenshots/<run>/`
    pub output_dir: PathBuf,
    pub timeout_ms: u64,
    pub screenshot_on_failure: bool,
}

impl From<&Config> for StepOptions {
    fn from(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            timeout_ms: config.step_timeout_ms,
            screenshot_on_failure: config.screenshot_on_failure,
        }
    }
}

impl StepOptions {
    fn run_dir(&self, key: &DispatchKey) -> PathBuf {
        self.output_dir.join("screenshots").join(key.slug())
    }
}

/// Run `step` and turn the outcome into a result.
///
/// Driver errors never escape; they become failed expectations.
pub async fn execute_step(
    driver: &dyn BrowserDriver,
    key: &DispatchKey,
    index: usize,
    step: &Step,
    options: &StepOptions,
) -> StepResult {
    let description = step.description.clone();

    let outcome = match &step.action {
        // Waits are not bounded by the step timeout
        StepAction::Wait(ms) => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            return StepResult {
                description,
                expectation: None,
                screenshot: None,
            };
        }
        StepAction::Screenshot(name) => {
            let file = match name {
                Some(name) => format!("{}.png", name),
                None => format!("step-{:02}.png", index + 1),
            };
            let path = options.run_dir(key).join(file);
            match with_timeout(options.timeout_ms, driver.screenshot(&path)).await {
                Ok(()) => return StepResult::captured(description, path_string(&path)),
                Err(e) => Err(Expectation::fail(format!("{:#}", e))),
            }
        }
        action => perform(driver, action, options.timeout_ms).await,
    };

    match outcome {
        Ok(()) => StepResult::passed(description),
        Err(expectation) => {
            log::debug!("[{}] step {} failed: {:?}", key, index + 1, expectation);
            let result = StepResult::failed(description, expectation);
            if !options.screenshot_on_failure {
                return result;
            }
            let path = options
                .run_dir(key)
                .join(format!("failure-step-{:02}.png", index + 1));
            match with_timeout(options.timeout_ms, driver.screenshot(&path)).await {
                Ok(()) => result.with_screenshot(path_string(&path)),
                Err(e) => {
                    log::warn!("[{}] failure screenshot not captured: {:#}", key, e);
                    result
                }
            }
        }
    }
}

/// Actions that pass or fail
async fn perform(
    driver: &dyn BrowserDriver,
    action: &StepAction,
    timeout_ms: u64,
) -> std::result::Result<(), Expectation> {
    let failed = |e: anyhow::Error| Expectation::fail(format!("{:#}", e));

    match action {
        StepAction::Navigate(url) => with_timeout(timeout_ms, driver.navigate(url))
            .await
            .map_err(failed),
        StepAction::Click(selector) => with_timeout(timeout_ms, driver.click(selector))
            .await
            .map_err(failed),
        StepAction::Input { selector, text } => {
            with_timeout(timeout_ms, driver.input(selector, text))
                .await
                .map_err(failed)
        }
        StepAction::AssertText { selector, contains } => {
            let actual = with_timeout(timeout_ms, driver.text(selector))
                .await
                .map_err(failed)?;
            if actual.contains(contains.as_str()) {
                Ok(())
            } else {
                Err(Expectation::Fail {
                    given: Some(format!("Text of {}: {:?}", selector, actual)),
                    message: format!("Expected to contain {:?}", contains),
                })
            }
        }
        StepAction::AssertVisible(selector) => {
            let visible = with_timeout(timeout_ms, driver.wait_visible(selector, timeout_ms))
                .await
                .map_err(failed)?;
            if visible {
                Ok(())
            } else {
                Err(Expectation::fail(format!(
                    "Element not visible within {}ms: {}",
                    timeout_ms, selector
                )))
            }
        }
        StepAction::Screenshot(_) | StepAction::Wait(_) => Ok(()),
    }
}

async fn with_timeout<T>(
    timeout_ms: u64,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Timed out after {}ms", timeout_ms),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
