use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Browser engine to launch for a suite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "chromium" | "chrome" => Some(BrowserKind::Chromium),
            "firefox" => Some(BrowserKind::Firefox),
            "webkit" | "safari" => Some(BrowserKind::Webkit),
            _ => None,
        }
    }
}

/// Header document of a suite file (everything before `---`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteHeader {
    pub name: Option<String>,
    pub browser: Option<String>,
    pub headless: Option<bool>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub screenshot_on_failure: Option<bool>,
}

/// A parsed suite file: header plus the run tree it declares
#[derive(Debug, Clone)]
pub struct Suite {
    pub header: SuiteHeader,
    pub root: RunNode,
}

/// One browser interaction and its expected outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub description: String,
    pub action: StepAction,
}

impl Step {
    /// Create a step with a description generated from the action
    pub fn new(action: StepAction) -> Self {
        Self {
            description: action.describe(),
            action,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Navigate to a URL (relative URLs resolve against the base URL)
    Navigate(String),
    /// Click the first element matching a CSS selector
    Click(String),
    /// Fill text into an input
    Input { selector: String, text: String },
    /// Assert an element's text contains a substring
    AssertText { selector: String, contains: String },
    /// Assert an element becomes visible within the step timeout
    AssertVisible(String),
    /// Capture a screenshot; `None` names it after the step index
    Screenshot(Option<String>),
    /// Pause for a number of milliseconds
    Wait(u64),
}

impl StepAction {
    pub fn describe(&self) -> String {
        match self {
            StepAction::Navigate(url) => format!("navigate {}", url),
            StepAction::Click(selector) => format!("click {}", selector),
            StepAction::Input { selector, text } => format!("input {:?} into {}", text, selector),
            StepAction::AssertText { selector, contains } => {
                format!("assert {} contains {:?}", selector, contains)
            }
            StepAction::AssertVisible(selector) => format!("assert {} is visible", selector),
            StepAction::Screenshot(Some(name)) => format!("screenshot {}", name),
            StepAction::Screenshot(None) => "screenshot".to_string(),
            StepAction::Wait(ms) => format!("wait {}ms", ms),
        }
    }
}

/// Recursive named grouping of step lists
///
/// Names are free text. Qualification with group prefixes happens only
/// when the tree is flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum RunNode {
    Leaf { name: String, steps: Arc<[Step]> },
    Group { name: String, children: Vec<RunNode> },
}

impl RunNode {
    pub fn leaf(name: impl Into<String>, steps: Vec<Step>) -> Self {
        RunNode::Leaf {
            name: name.into(),
            steps: steps.into(),
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<RunNode>) -> Self {
        RunNode::Group {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RunNode::Leaf { name, .. } | RunNode::Group { name, .. } => name,
        }
    }
}

// Children are detached onto a work list so deep trees never recurse on drop
impl Drop for RunNode {
    fn drop(&mut self) {
        let RunNode::Group { children, .. } = self else {
            return;
        };
        let mut pending = std::mem::take(children);
        while let Some(mut node) = pending.pop() {
            if let RunNode::Group { children, .. } = &mut node {
                pending.append(children);
            }
        }
    }
}
