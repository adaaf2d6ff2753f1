//! Application bundle build step

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{PackError, Result};
use crate::traits::{AppBuilder, BuildRequest};

/// [`AppBuilder`] that stages a prebuilt `.app` bundle into the output directory
#[derive(Debug, Clone)]
pub struct CopyAppBuilder {
    source: PathBuf,
}

impl CopyAppBuilder {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl AppBuilder for CopyAppBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<()> {
        let dest = request.app_path();
        if !self.source.is_dir() {
            return Err(PackError::BuildFailed(format!(
                "application bundle {} does not exist",
                self.source.display()
            )));
        }
        if self.source == dest {
            debug!(app = %dest.display(), "bundle already in place");
            return Ok(());
        }

        info!(
            from = %self.source.display(),
            to = %dest.display(),
            arch = %request.arch,
            platform = %request.platform,
            "staging application bundle"
        );
        if tokio::fs::try_exists(&dest).await? {
            tokio::fs::remove_dir_all(&dest).await?;
        }

        let from = self.source.clone();
        tokio::task::spawn_blocking(move || copy_tree(&from, &dest))
            .await
            .map_err(|e| PackError::Task(format!("bundle copy panicked: {}", e)))??;
        Ok(())
    }
}

/// Recursive copy keeping symlinks, as bundles use them for framework versions
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let dest = to.join(relative);

        if entry.file_type().is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            symlink(&target, &dest)?;
        } else if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::fs::copy(target, link).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use macpack_core::Arch;
    use macpack_signing::SignPlatform;
    use tempfile::TempDir;

    fn request(out: &Path) -> BuildRequest {
        BuildRequest {
            app_out_dir: out.to_path_buf(),
            product_name: "App".to_string(),
            arch: Arch::X64,
            platform: SignPlatform::Darwin,
            sign_in_build: true,
        }
    }

    #[tokio::test]
    async fn test_copies_bundle() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/App.app");
        std::fs::create_dir_all(source.join("Contents/MacOS")).unwrap();
        std::fs::write(source.join("Contents/MacOS/App"), b"bin").unwrap();
        std::fs::write(source.join("Contents/Info.plist"), b"plist").unwrap();

        let out = temp.path().join("dist/mac");
        CopyAppBuilder::new(&source).build(&request(&out)).await.unwrap();

        let copied = out.join("App.app");
        assert_eq!(std::fs::read(copied.join("Contents/MacOS/App")).unwrap(), b"bin");
        assert!(copied.join("Contents/Info.plist").is_file());
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let err = CopyAppBuilder::new(temp.path().join("Missing.app"))
            .build(&request(temp.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::BuildFailed(_)));
    }

    #[tokio::test]
    async fn test_bundle_in_place_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("App.app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("marker"), b"x").unwrap();

        CopyAppBuilder::new(&app).build(&request(temp.path())).await.unwrap();
        assert!(app.join("marker").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_preserved() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src/App.app");
        let versions = source.join("Contents/Frameworks/Lib.framework/Versions");
        std::fs::create_dir_all(versions.join("A")).unwrap();
        std::os::unix::fs::symlink("A", versions.join("Current")).unwrap();

        let out = temp.path().join("out");
        CopyAppBuilder::new(&source).build(&request(&out)).await.unwrap();

        let link = out.join("App.app/Contents/Frameworks/Lib.framework/Versions/Current");
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&link).unwrap(), PathBuf::from("A"));
    }
}
