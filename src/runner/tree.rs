//! Flattening of the run tree into dispatchable entries.

use crate::parser::types::{RunNode, Step};
use crate::runner::state::DispatchKey;
use std::sync::Arc;

/// Separator placed between a group name and its descendants
pub const NAME_SEPARATOR: &str = " / ";

/// A leaf of the run tree with its group-qualified display name
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRun {
    pub name: String,
    pub steps: Arc<[Step]>,
}

/// Flatten a run tree into leaves, depth-first, in declaration order.
///
/// Uses an explicit stack so deeply nested suites cannot exhaust the call stack.
/// Step lists are shared with the tree, never copied.
pub fn flatten(tree: &RunNode) -> Vec<FlatRun> {
    let mut runs = Vec::new();
    let mut stack: Vec<(Option<String>, &RunNode)> = vec![(None, tree)];

    while let Some((prefix, node)) = stack.pop() {
        let qualified = match prefix {
            Some(p) => format!("{}{}{}", p, NAME_SEPARATOR, node.name()),
            None => node.name().to_string(),
        };
        match node {
            RunNode::Leaf { steps, .. } => runs.push(FlatRun {
                name: qualified,
                steps: Arc::clone(steps),
            }),
            RunNode::Group { children, .. } => {
                // Reversed so the first child is popped first
                for child in children.iter().rev() {
                    stack.push((Some(qualified.clone()), child));
                }
            }
        }
    }

    runs
}

/// Keep runs whose qualified name contains `filter` and key them by their
/// position in the filtered list.
pub fn select(runs: Vec<FlatRun>, filter: Option<&str>) -> Vec<(DispatchKey, FlatRun)> {
    runs.into_iter()
        .filter(|run| filter.map_or(true, |f| run.name.contains(f)))
        .enumerate()
        .map(|(index, run)| (DispatchKey::new(index, run.name.clone()), run))
        .collect()
}
