use super::error::SuiteError;
use super::types::{RunNode, Step, StepAction, Suite, SuiteHeader};
use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Parse a suite file, or every suite file below a directory
pub fn parse_suite_path(path: &Path) -> Result<Suite> {
    if path.is_dir() {
        return parse_suite_dir(path);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_suite_content(&content, path)
}

/// Each file below `dir` becomes one child of a group named after the directory.
/// The first header found supplies the suite settings.
fn parse_suite_dir(dir: &Path) -> Result<Suite> {
    let mut files: Vec<_> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let path = e.path();
            let is_yaml = path
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml");
            let path_str = path.to_string_lossy();
            let in_subflows = path_str.contains("/subflows/") || path_str.contains("\\subflows\\");
            is_yaml && !in_subflows
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    let mut header: Option<SuiteHeader> = None;
    let mut children = Vec::with_capacity(files.len());
    for file in &files {
        let suite = parse_suite_path(file)?;
        if header.is_none() {
            header = Some(suite.header);
        }
        children.push(suite.root);
    }

    if children.is_empty() {
        return Err(SuiteError::Empty)
            .with_context(|| format!("No suite files found in {}", dir.display()));
    }

    Ok(Suite {
        header: header.unwrap_or_default(),
        root: RunNode::group(stem(dir), children),
    })
}

/// Parse YAML content into a Suite
pub fn parse_suite_content(content: &str, source_path: &Path) -> Result<Suite> {
    let (header_yaml, body_yaml) = split_header(content);

    let header: SuiteHeader = match header_yaml {
        Some(h) if !h.trim().is_empty() => serde_yaml::from_str(h)
            .with_context(|| format!("Failed to parse header of {}", source_path.display()))?,
        _ => SuiteHeader::default(),
    };

    let body: Value = serde_yaml::from_str(body_yaml)
        .with_context(|| format!("Failed to parse YAML content of {}", source_path.display()))?;

    let root = match body {
        Value::Sequence(seq) => {
            if seq.is_empty() {
                return Err(SuiteError::Empty.into());
            }
            let children = seq.iter().map(parse_node).collect::<Result<Vec<_>>>()?;
            let name = header.name.clone().unwrap_or_else(|| stem(source_path));
            RunNode::group(name, children)
        }
        Value::Mapping(_) => parse_node(&body)?,
        Value::Null => return Err(SuiteError::Empty.into()),
        _ => {
            return Err(SuiteError::MalformedNode {
                keys: "<scalar>".to_string(),
            }
            .into())
        }
    };

    Ok(Suite { header, root })
}

fn split_header(content: &str) -> (Option<&str>, &str) {
    // Only a line consisting of `---` separates header and body
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return (Some(&content[..offset]), &content[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, content)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("suite")
        .to_string()
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(&Value::String(key.to_string()))
}

fn name_of(map: &Mapping, field: &'static str) -> Result<String, SuiteError> {
    match get(map, field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(SuiteError::MissingName { field }),
    }
}

/// Parse a single `describe` or `test` node
pub fn parse_node(value: &Value) -> Result<RunNode> {
    let map = match value {
        Value::Mapping(map) => map,
        _ => {
            return Err(SuiteError::MalformedNode {
                keys: "<not a mapping>".to_string(),
            }
            .into())
        }
    };

    if get(map, "describe").is_some() {
        let name = name_of(map, "describe")?;
        let children = match get(map, "runs") {
            Some(Value::Sequence(seq)) => seq
                .iter()
                .map(parse_node)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("In group '{}'", name))?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(SuiteError::MalformedNode {
                    keys: format!("describe: {} (runs is not a list)", name),
                }
                .into())
            }
        };
        return Ok(RunNode::group(name, children));
    }

    if get(map, "test").is_some() {
        let name = name_of(map, "test")?;
        let steps = match get(map, "steps") {
            Some(Value::Sequence(seq)) => seq
                .iter()
                .map(parse_step)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("In test '{}'", name))?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(SuiteError::MalformedNode {
                    keys: format!("test: {} (steps is not a list)", name),
                }
                .into())
            }
        };
        return Ok(RunNode::leaf(name, steps));
    }

    let keys = map
        .keys()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    Err(SuiteError::MalformedNode { keys }.into())
}

/// Parse a single step entry
pub fn parse_step(value: &Value) -> Result<Step> {
    match value {
        // Shortcut: "- screenshot"
        Value::String(s) if s == "screenshot" => Ok(Step::new(StepAction::Screenshot(None))),
        Value::String(s) => Err(SuiteError::UnknownAction(s.clone()).into()),
        Value::Mapping(map) => {
            let description = get(map, "description")
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut action = None;
            for (key, params) in map {
                let Some(key) = key.as_str() else { continue };
                if key == "description" {
                    continue;
                }
                if action.is_some() {
                    return Err(SuiteError::InvalidStep {
                        action: key.to_string(),
                        reason: "a step may only contain one action".to_string(),
                    }
                    .into());
                }
                action = Some(parse_action(key, params)?);
            }

            let action = action.ok_or_else(|| SuiteError::MalformedNode {
                keys: "description".to_string(),
            })?;
            let step = Step::new(action);
            Ok(match description {
                Some(d) => step.with_description(d),
                None => step,
            })
        }
        _ => Err(SuiteError::InvalidStep {
            action: "<unknown>".to_string(),
            reason: "step must be a mapping".to_string(),
        }
        .into()),
    }
}

fn string_param(action: &str, params: &Value) -> Result<String, SuiteError> {
    match params {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(SuiteError::InvalidStep {
            action: action.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

fn field(action: &str, params: &Value, name: &str) -> Result<String, SuiteError> {
    let map = params.as_mapping().ok_or_else(|| SuiteError::InvalidStep {
        action: action.to_string(),
        reason: format!("expected a mapping with '{}'", name),
    })?;
    get(map, name)
        .ok_or_else(|| SuiteError::InvalidStep {
            action: action.to_string(),
            reason: format!("missing '{}'", name),
        })
        .and_then(|v| string_param(action, v))
}

fn parse_action(key: &str, params: &Value) -> Result<StepAction, SuiteError> {
    let action = match key {
        "navigate" | "open" => StepAction::Navigate(string_param(key, params)?),
        "click" | "tapOn" => StepAction::Click(string_param(key, params)?),
        "input" | "inputText" => StepAction::Input {
            selector: field(key, params, "selector")?,
            text: field(key, params, "text")?,
        },
        "assertText" => StepAction::AssertText {
            selector: field(key, params, "selector")?,
            contains: field(key, params, "contains")?,
        },
        "assertVisible" => StepAction::AssertVisible(string_param(key, params)?),
        "screenshot" | "takeScreenshot" => match params {
            Value::Null => StepAction::Screenshot(None),
            other => StepAction::Screenshot(Some(string_param(key, other)?)),
        },
        "wait" => match params {
            Value::Number(n) => StepAction::Wait(n.as_u64().ok_or_else(|| {
                SuiteError::InvalidStep {
                    action: key.to_string(),
                    reason: "expected a non-negative number of milliseconds".to_string(),
                }
            })?),
            _ => {
                return Err(SuiteError::InvalidStep {
                    action: key.to_string(),
                    reason: "expected a number of milliseconds".to_string(),
                })
            }
        },
        other => return Err(SuiteError::UnknownAction(other.to_string())),
    };
    Ok(action)
}
