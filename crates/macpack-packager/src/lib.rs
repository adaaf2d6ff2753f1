//! macpack packager - turning a built app into distributable files
//!
//! This crate provides:
//! - [`MacPackager`], which builds and signs the direct and App Store variants
//! - [`ArtifactPipeline`], which writes disk images and archives
//! - [`PackRun`], which drives packagers and owns per-run cleanup

pub mod archive;
pub mod build;
pub mod context;
pub mod distributable;
pub mod dmg;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod run;
pub mod traits;

#[cfg(test)]
mod testing;

pub use archive::{ArchiveTarget, DittoArchiver, ARCHIVE_FORMATS};
pub use build::CopyAppBuilder;
pub use context::{PackContext, PackagerTools};
pub use distributable::ArtifactPipeline;
pub use dmg::{DmgEntry, DmgEntryKind, DmgSpecification, HdiutilImageWriter};
pub use error::{PackError, Result};
pub use pipeline::{DistributableTask, MacPackager};
pub use run::PackRun;
pub use traits::{
    AppBuilder, ArchiveRequest, Archiver, BuildRequest, ImageWriter, Platform, PlatformPackager,
};
