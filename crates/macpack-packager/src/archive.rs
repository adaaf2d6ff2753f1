//! Archive creation

use std::ffi::OsString;

use async_trait::async_trait;
use macpack_core::{BuildTarget, Compression};
use tracing::info;

use crate::error::{PackError, Result};
use crate::process::{find_tool, run_tool};
use crate::traits::{ArchiveRequest, Archiver};

/// Archive formats the archiver can write
pub const ARCHIVE_FORMATS: &[&str] = &["zip", "7z", "tar.gz", "tgz", "tar.bz2", "tar.xz"];

/// Format and file-name classifier for an archive target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
    pub format: String,
    pub classifier: &'static str,
}

impl ArchiveTarget {
    /// Resolve an archive target.
    ///
    /// `default` is a zip classified `mac`, the format the platform updater
    /// expects. Explicit formats are classified `osx`. `dmg` and `mas` are
    /// not archives.
    pub fn for_target(target: &BuildTarget) -> Option<Self> {
        match target {
            BuildTarget::Default => Some(Self {
                format: "zip".to_string(),
                classifier: "mac",
            }),
            BuildTarget::Archive(format) => Some(Self {
                format: format.clone(),
                classifier: "osx",
            }),
            BuildTarget::Dmg | BuildTarget::Mas => None,
        }
    }

    /// `<name>-<version>-<classifier>.<format>`
    pub fn file_name(&self, name: &str, version: &str) -> String {
        format!("{}-{}-{}.{}", name, version, self.classifier, self.format)
    }
}

/// [`Archiver`] using `ditto` for zip, `tar` for tarballs and `7z` otherwise
#[derive(Debug, Clone, Default)]
pub struct DittoArchiver;

impl DittoArchiver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Archiver for DittoArchiver {
    async fn archive(&self, request: &ArchiveRequest) -> Result<()> {
        let app = request.app.as_os_str().to_os_string();
        let out = request.out_file.as_os_str().to_os_string();
        info!(format = %request.format, out = %request.out_file.display(), "creating archive");

        match request.format.as_str() {
            "zip" => {
                let ditto = find_tool("ditto", "ditto ships with macOS")?;
                let args: Vec<OsString> = vec![
                    "-c".into(),
                    "-k".into(),
                    "--sequesterRsrc".into(),
                    "--keepParent".into(),
                    app,
                    out,
                ];
                run_tool("ditto", ditto, args).await
            }
            "tar.gz" | "tgz" | "tar.bz2" | "tar.xz" => {
                let tar = find_tool("tar", "install bsdtar or GNU tar")?;
                let flag = match request.format.as_str() {
                    "tar.bz2" => "-cjf",
                    "tar.xz" => "-cJf",
                    _ => "-czf",
                };
                let (Some(parent), Some(bundle)) = (request.app.parent(), request.app.file_name())
                else {
                    return Err(PackError::BuildFailed(format!(
                        "invalid application path {}",
                        request.app.display()
                    )));
                };
                let args: Vec<OsString> = vec![
                    flag.into(),
                    out,
                    "-C".into(),
                    parent.as_os_str().to_os_string(),
                    bundle.to_os_string(),
                ];
                run_tool("tar", tar, args).await
            }
            "7z" => {
                let seven_zip = find_tool("7z", "install p7zip: brew install p7zip")
                    .or_else(|_| find_tool("7za", "install p7zip: brew install p7zip"))?;
                let level = match request.compression {
                    Compression::Store => "-mx=0",
                    Compression::Normal => "-mx=5",
                    Compression::Maximum => "-mx=9",
                };
                let args: Vec<OsString> = vec!["a".into(), level.into(), out, app];
                run_tool("7z", seven_zip, args).await
            }
            other => Err(PackError::UnsupportedTarget {
                target: other.to_string(),
                platform: "macos".to_string(),
            }),
        }
    }
}
