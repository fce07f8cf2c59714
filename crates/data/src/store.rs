//! Atomic JSON position store.
//!
//! Writers build the full new collection and replace the file in one
//! rename; a concurrent reader sees either the old or the new store,
//! never a partial write.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use gexbot_core::position::OpenPosition;

pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all open positions. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<OpenPosition>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("corrupt position store {}", self.path.display()))
    }

    /// Replace the store atomically: write a sibling temp file, then rename
    /// over the live one. Never truncates in place.
    pub fn save(&self, positions: &[OpenPosition]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(positions)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!(
            path = %self.path.display(),
            count = positions.len(),
            "position store saved"
        );
        Ok(())
    }

    /// Append one position.
    pub fn append(&self, position: OpenPosition) -> Result<()> {
        let mut positions = self.load()?;
        positions.push(position);
        self.save(&positions)
    }

    /// Remove a position by order id. Returns it when found.
    pub fn remove(&self, id: &str) -> Result<Option<OpenPosition>> {
        let mut positions = self.load()?;
        let idx = positions.iter().position(|p| p.id == id);
        let removed = idx.map(|i| positions.remove(i));
        if removed.is_some() {
            self.save(&positions)?;
        }
        Ok(removed)
    }
}
