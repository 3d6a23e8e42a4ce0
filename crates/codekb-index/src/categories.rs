//! Per-namespace category labels.
//!
//! Categories are free-text labels kept as an ordered, duplicate-free list
//! in `categories.json`. They are independent of the labels stored on
//! snippets: scanning with a label does not register it here.

use std::path::PathBuf;

use crate::store::{self, Namespace, Result};

/// The category list of one namespace.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    path: PathBuf,
}

impl CategoryStore {
    pub fn new(ns: &Namespace) -> Self {
        Self {
            path: ns.categories_path(),
        }
    }

    /// Current labels in insertion order. A missing file is an empty list.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        store::read_json(&self.path)
    }

    /// Append a label. Returns `false` if it was already present.
    pub fn add(&self, label: &str) -> Result<bool> {
        let mut labels = self.list()?;
        if labels.iter().any(|l| l == label) {
            return Ok(false);
        }
        labels.push(label.to_string());
        self.write(&labels)?;
        Ok(true)
    }

    /// Remove a label. Returns `false` if it was not present.
    pub fn remove(&self, label: &str) -> Result<bool> {
        let mut labels = self.list()?;
        let before = labels.len();
        labels.retain(|l| l != label);
        if labels.len() == before {
            return Ok(false);
        }
        self.write(&labels)?;
        Ok(true)
    }

    fn write(&self, labels: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| store::StoreError::io(parent, e))?;
        }
        store::write_json(&self.path, labels)
    }
}
