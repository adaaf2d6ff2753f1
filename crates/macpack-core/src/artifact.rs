//! Artifact records and the sink that receives them
//!
//! Every distributable file produced by a run is reported exactly once through
//! an [`ArtifactSink`]. Reports from concurrent targets arrive in no
//! particular order.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;

/// A produced distributable file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    path: PathBuf,
    suggested_name: String,
}

impl ArtifactRecord {
    /// Create a record; relative paths are anchored at the current directory
    pub fn new(path: impl Into<PathBuf>, suggested_name: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        };

        Self {
            path,
            suggested_name: suggested_name.into(),
        }
    }

    /// Absolute path of the produced file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name the file should carry when published
    pub fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    /// File name on disk
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Receiver for artifact-created notifications
pub trait ArtifactSink: Send + Sync {
    /// Called once per produced artifact
    fn artifact_created(&self, artifact: &ArtifactRecord);
}

/// Sink that keeps every reported artifact in memory
#[derive(Debug, Default)]
pub struct ArtifactCollector {
    artifacts: Mutex<Vec<ArtifactRecord>>,
}

impl ArtifactCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the artifacts reported so far
    pub fn artifacts(&self) -> Vec<ArtifactRecord> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Suggested names of the reported artifacts, sorted
    pub fn suggested_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .artifacts()
            .into_iter()
            .map(|a| a.suggested_name)
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactSink for ArtifactCollector {
    fn artifact_created(&self, artifact: &ArtifactRecord) {
        info!(
            path = %artifact.path().display(),
            name = artifact.suggested_name(),
            "artifact created"
        );
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(artifact.clone());
    }
}
