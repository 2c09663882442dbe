//! Screenshot manifest written at the end of a suite.

use crate::runner::state::DispatchKey;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the manifest inside the output directory
pub const MANIFEST_FILE: &str = "screenshots.json";

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    index: usize,
    name: &'a str,
    paths: &'a [String],
}

/// Screenshot paths per run, in dispatch order
#[derive(Debug, Default)]
pub struct ScreenshotManifest {
    runs: BTreeMap<DispatchKey, Vec<String>>,
}

impl ScreenshotManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &DispatchKey, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        self.runs
            .entry(key.clone())
            .or_default()
            .extend(paths.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn paths(&self, key: &DispatchKey) -> &[String] {
        self.runs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<ManifestEntry<'_>> = self
            .runs
            .iter()
            .map(|(key, paths)| ManifestEntry {
                index: key.index(),
                name: key.name(),
                paths,
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Write `screenshots.json` into `output_dir` and return its path
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        let path = output_dir.join(MANIFEST_FILE);
        std::fs::write(&path, self.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
