use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder shown for a run that has been dispatched but not spawned
pub const WAITING_FOR_START: &str = "Waiting for start";

/// Unique identifier of a dispatched run: its position in the filtered
/// run list plus its qualified display name.
///
/// Ordering follows the dispatch index, so tables keyed by it list runs in
/// dispatch order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DispatchKey {
    index: usize,
    name: String,
}

impl DispatchKey {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Qualified display name, without the index prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A filesystem-safe rendering for artifact directories
    pub fn slug(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        format!("{:03}_{}", self.index, name)
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.index, self.name)
    }
}

/// Live progress of one dispatched run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub failed: bool,
    pub total: usize,
    pub remaining: usize,
    pub next_step: String,
}

impl RunStatus {
    pub fn new(total: usize) -> Self {
        Self {
            failed: false,
            total,
            remaining: total,
            next_step: WAITING_FOR_START.to_string(),
        }
    }

    /// Apply a progress report. `failed` is sticky: once set it never clears.
    pub fn advance(&mut self, remaining: usize, has_failures: bool, next_step: String) {
        self.remaining = remaining;
        self.failed = self.failed || has_failures;
        self.next_step = next_step;
    }

    pub fn completed(&self) -> usize {
        self.total.saturating_sub(self.remaining)
    }
}

/// Full status snapshot, in dispatch order
pub type StatusSnapshot = Vec<(DispatchKey, RunStatus)>;

/// Run statuses keyed by dispatch key. Entries are kept after a run
/// finishes so later snapshots still list it.
#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    entries: BTreeMap<DispatchKey, RunStatus>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: DispatchKey, status: RunStatus) {
        self.entries.insert(key, status);
    }

    pub fn get(&self, key: &DispatchKey) -> Option<&RunStatus> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &DispatchKey) -> Option<&mut RunStatus> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &DispatchKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
