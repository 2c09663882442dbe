//! Pass/fail accumulation and report text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one assertion (or of an action treated as one)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Expectation {
    Pass,
    Fail {
        /// Context shown before the message, e.g. the observed value
        given: Option<String>,
        message: String,
    },
}

impl Expectation {
    pub fn fail(message: impl Into<String>) -> Self {
        Expectation::Fail {
            given: None,
            message: message.into(),
        }
    }
}

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub description: String,
    pub expectation: Option<Expectation>,
    pub screenshot: Option<String>,
}

impl StepResult {
    pub fn passed(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expectation: Some(Expectation::Pass),
            screenshot: None,
        }
    }

    pub fn failed(description: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            description: description.into(),
            expectation: Some(expectation),
            screenshot: None,
        }
    }

    pub fn captured(description: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expectation: None,
            screenshot: Some(path.into()),
        }
    }

    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot = Some(path.into());
        self
    }
}

/// Accumulated results, per run or for the whole suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub output: String,
    pub passed: u32,
    pub failed: u32,
    pub screenshots: Vec<String>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a step result into this summary
    pub fn record(&mut self, result: &StepResult) {
        if let Some(expectation) = &result.expectation {
            self.record_expectation(&result.description, expectation);
        }
        if let Some(path) = &result.screenshot {
            self.screenshots.push(path.clone());
        }
    }

    fn record_expectation(&mut self, description: &str, expectation: &Expectation) {
        match expectation {
            Expectation::Pass => {
                self.output.push_str(&format!("✅  {}\n", description));
                self.passed += 1;
            }
            Expectation::Fail { given, message } => {
                self.output.push_str(&format!("❌  {}\n", description));
                if let Some(given) = given.as_deref().filter(|g| !g.is_empty()) {
                    self.output.push_str(given);
                    self.output.push('\n');
                }
                self.output.push_str(&indent(message, 4));
                self.output.push_str("\n\n");
                self.failed += 1;
            }
        }
    }

    /// Add another summary's counts; text and screenshots are not merged
    pub fn absorb_counts(&mut self, other: &Summary) {
        self.passed += other.passed;
        self.failed += other.failed;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Append the per-run timing footer
    pub fn with_timing(mut self, elapsed_secs: f64, wait_secs: f64) -> Self {
        self.output.push_str(&format!(
            "Took {:.2}s. Waited {:.2}s for dispatch",
            elapsed_secs, wait_secs
        ));
        self
    }

    /// Write the final suite report into `output`
    pub fn finalize(&mut self, elapsed_secs: f64) {
        let status = if self.failed > 0 {
            format!("Failed: {} assertions failed, ", self.failed)
        } else {
            "OK. ".to_string()
        };
        let epilog = format!(
            "{} assertions passed. Took {:.2}s in total.",
            self.passed, elapsed_secs
        );
        self.output = format!("\n\n{}{}", status, epilog);
    }

    /// Process exit code for a finished suite
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }
}

/// Seconds from `start` to `end`, at millisecond resolution
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}
