//! Shared packaging context

use std::path::{Path, PathBuf};
use std::sync::Arc;

use macpack_core::{ArtifactSink, BuildResources, Config};
use macpack_signing::SigningTools;
use tracing::debug;

use crate::error::Result;
use crate::traits::{AppBuilder, Archiver, ImageWriter};

/// Product configuration and resource probe results shared by every stage
pub struct PackContext {
    pub config: Config,
    pub project_dir: PathBuf,
    pub resources: BuildResources,
    pub sink: Arc<dyn ArtifactSink>,
}

impl PackContext {
    /// Create a context, listing the build resources directory once
    pub async fn load(
        config: Config,
        project_dir: impl Into<PathBuf>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self> {
        let project_dir = project_dir.into();
        let resources_dir = project_dir.join(&config.directories.build_resources);
        let resources = BuildResources::scan(&resources_dir).await?;
        debug!(dir = %resources_dir.display(), "build resources loaded");

        Ok(Self {
            config,
            project_dir,
            resources,
            sink,
        })
    }

    /// Create a context from already known resources
    pub fn new(
        config: Config,
        project_dir: impl Into<PathBuf>,
        resources: BuildResources,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            config,
            project_dir: project_dir.into(),
            resources,
            sink,
        }
    }

    pub fn product_name(&self) -> &str {
        &self.config.product_name
    }

    /// Resolve a configured path against the project directory
    pub fn project_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

/// External tools a packager drives
#[derive(Clone)]
pub struct PackagerTools {
    pub signing: SigningTools,
    pub app_builder: Arc<dyn AppBuilder>,
    pub image_writer: Arc<dyn ImageWriter>,
    pub archiver: Arc<dyn Archiver>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use macpack_core::ArtifactCollector;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_scans_resources() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("build")).unwrap();
        std::fs::write(temp.path().join("build/icon.icns"), b"").unwrap();

        let ctx = PackContext::load(
            Config::default(),
            temp.path(),
            Arc::new(ArtifactCollector::new()),
        )
        .await
        .unwrap();

        assert!(ctx.resources.contains("icon.icns"));
        assert_eq!(ctx.project_path(Path::new("a/b")), temp.path().join("a/b"));
        assert_eq!(ctx.project_path(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
