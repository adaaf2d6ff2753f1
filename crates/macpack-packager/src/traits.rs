//! Seams between the packaging pipeline and the tools it drives
//!
//! Building the app, writing disk images and archiving are delegated to
//! implementations of these traits, so the pipeline can run against real tools
//! or in-memory fakes.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use macpack_core::{Arch, Compression};
use macpack_signing::SignPlatform;
use serde::Serialize;

use crate::dmg::DmgSpecification;
use crate::error::Result;
use crate::pipeline::DistributableTask;

/// Operating systems a packager can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packager for one platform
#[async_trait]
pub trait PlatformPackager: Send + Sync {
    fn platform(&self) -> Platform;

    /// Target names this packager understands
    fn supported_targets(&self) -> &'static [&'static str];

    /// Build and sign for every requested target.
    ///
    /// Distributable files are not created here; the returned task creates
    /// them and is meant to run alongside other platforms' tasks.
    async fn pack(&self, out_dir: &Path, arch: Arch) -> Result<Option<DistributableTask>>;
}

/// Request for the external application build step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Directory the `.app` bundle is written into
    pub app_out_dir: PathBuf,
    /// Bundle name without the `.app` extension
    pub product_name: String,
    pub arch: Arch,
    pub platform: SignPlatform,
    /// Whether the build step may sign on its own
    pub sign_in_build: bool,
}

impl BuildRequest {
    /// Path of the bundle this request produces
    pub fn app_path(&self) -> PathBuf {
        self.app_out_dir.join(format!("{}.app", self.product_name))
    }
}

/// The external application build step
#[async_trait]
pub trait AppBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<()>;
}

/// Writes disk images
#[async_trait]
pub trait ImageWriter: Send + Sync {
    async fn write(&self, spec: &DmgSpecification, target: &Path) -> Result<()>;
}

/// Request to archive an application bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    /// Archive format, e.g. `zip` or `tar.gz`
    pub format: String,
    /// The `.app` bundle
    pub app: PathBuf,
    pub out_file: PathBuf,
    pub compression: Compression,
}

/// Writes compressed archives
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(&self, request: &ArchiveRequest) -> Result<()>;
}
