//! Build-resource probing
//!
//! The build resources directory is listed once per run. Lookups after that
//! only answer "does resource X exist" and never touch the filesystem.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Application icon used for the disk image
pub const ICON_ICNS: &str = "icon.icns";

/// Disk image window background
pub const BACKGROUND_PNG: &str = "background.png";

/// Conventional entitlements file name for the given variant
pub fn entitlements_file(mas: bool) -> &'static str {
    if mas {
        "mas.entitlements"
    } else {
        "osx.entitlements"
    }
}

/// Conventional inherited-entitlements file name for the given variant
pub fn inherit_entitlements_file(mas: bool) -> &'static str {
    if mas {
        "mas.inherit.entitlements"
    } else {
        "osx.inherit.entitlements"
    }
}

/// Snapshot of the files in the build resources directory
#[derive(Debug, Clone, Default)]
pub struct BuildResources {
    dir: PathBuf,
    entries: BTreeSet<String>,
}

impl BuildResources {
    /// List the directory. A missing directory yields an empty snapshot.
    pub async fn scan(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        let mut entries = BTreeSet::new();

        match tokio::fs::read_dir(&dir).await {
            Ok(mut read_dir) => {
                while let Some(entry) = read_dir.next_entry().await? {
                    if let Some(name) = entry.file_name().to_str() {
                        entries.insert(name.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "build resources directory does not exist");
            }
            Err(e) => return Err(e),
        }

        debug!(dir = %dir.display(), count = entries.len(), "scanned build resources");
        Ok(Self { dir, entries })
    }

    /// Build a snapshot from known names without touching the filesystem
    pub fn from_entries<I, S>(dir: impl Into<PathBuf>, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir: dir.into(),
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    /// Full path of a resource, if it exists
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.contains(name).then(|| self.dir.join(name))
    }
}
