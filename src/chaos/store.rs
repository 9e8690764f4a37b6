//! YAML document store.
//!
//! Fault descriptions, manifest templates and rendered manifests all live in
//! flat directories addressed by file name.

use crate::error::{FaultlineError, Result};
use serde_yaml::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A directory of YAML documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the document called `name`.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !plain {
            return Err(FaultlineError::InvalidTemplate(format!(
                "document name {:?} must be a relative path without `..`",
                name
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Load and parse the document called `name`.
    pub fn load(&self, name: &str) -> Result<Value> {
        let path = self.path(name)?;
        if !path.is_file() {
            return Err(FaultlineError::TemplateNotFound(path));
        }

        debug!(path = %path.display(), "Loading document");
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Serialize `document` and write it as `name`, replacing any previous file.
    pub fn save(&self, name: &str, document: &Value) -> Result<PathBuf> {
        let path = self.path(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, dump(document)?)?;
        debug!(path = %path.display(), "Wrote document");
        Ok(path)
    }
}

/// Serialize a document in block style.
pub fn dump(document: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(document)?)
}
