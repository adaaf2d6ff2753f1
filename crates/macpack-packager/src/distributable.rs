//! Distributable artifact creation
//!
//! Turns a signed application bundle into the disk images and archives the
//! run asked for. Every requested format is produced concurrently and each
//! finished file is reported to the artifact sink.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use macpack_core::{Arch, ArtifactRecord, BuildTarget};
use tokio::task::JoinSet;
use tracing::{info, instrument};

use crate::archive::ArchiveTarget;
use crate::context::PackContext;
use crate::dmg::DmgSpecification;
use crate::error::{PackError, Result};
use crate::traits::{ArchiveRequest, Archiver, ImageWriter};

/// Produces disk images and archives from a finished bundle
#[derive(Clone)]
pub struct ArtifactPipeline {
    ctx: Arc<PackContext>,
    image_writer: Arc<dyn ImageWriter>,
    archiver: Arc<dyn Archiver>,
}

impl ArtifactPipeline {
    pub fn new(
        ctx: Arc<PackContext>,
        image_writer: Arc<dyn ImageWriter>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            ctx,
            image_writer,
            archiver,
        }
    }

    /// Create every non-App-Store artifact for the bundle in `app_out_dir`.
    ///
    /// At most one disk image is written, even when both `dmg` and `default`
    /// are requested. All formats run to completion even when one fails; the
    /// first failure is returned.
    #[instrument(
        skip(self, out_dir, app_out_dir, arch),
        fields(out_dir = %out_dir.display(), arch = %arch)
    )]
    pub async fn package_in_distributable_format(
        &self,
        out_dir: &Path,
        app_out_dir: &Path,
        arch: Arch,
    ) -> Result<Vec<ArtifactRecord>> {
        let mut tasks = JoinSet::new();
        let mut dmg_queued = false;

        for target in self.ctx.config.targets.iter() {
            if matches!(target, BuildTarget::Dmg | BuildTarget::Default) && !dmg_queued {
                dmg_queued = true;
                let this = self.clone();
                let app_out_dir = app_out_dir.to_path_buf();
                tasks.spawn(async move { this.create_dmg(&app_out_dir).await });
            }

            if let Some(archive) = ArchiveTarget::for_target(target) {
                let this = self.clone();
                let app_out_dir = app_out_dir.to_path_buf();
                tasks.spawn(async move { this.create_archive(&archive, &app_out_dir).await });
            }
        }

        let mut records = Vec::new();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| PackError::Task(e.to_string())).and_then(|r| r);
            match outcome {
                Ok(record) => records.push(record),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(records),
        }
    }

    async fn create_dmg(&self, app_out_dir: &Path) -> Result<ArtifactRecord> {
        let config = &self.ctx.config;
        let file = app_out_dir.join(format!("{}-{}.dmg", config.product_name, config.version));
        let spec = DmgSpecification::compute(&self.ctx, app_out_dir);

        info!(dmg = %file.display(), "creating DMG");
        tokio::fs::create_dir_all(app_out_dir).await?;
        self.image_writer.write(&spec, &file).await?;

        Ok(self.report(
            file,
            format!("{}-{}.dmg", config.artifact_name(), config.version),
        ))
    }

    async fn create_archive(
        &self,
        archive: &ArchiveTarget,
        app_out_dir: &Path,
    ) -> Result<ArtifactRecord> {
        let config = &self.ctx.config;
        let file = app_out_dir.join(archive.file_name(&config.product_name, &config.version));

        self.archiver
            .archive(&ArchiveRequest {
                format: archive.format.clone(),
                app: app_out_dir.join(format!("{}.app", config.product_name)),
                out_file: file.clone(),
                compression: config.compression,
            })
            .await?;

        Ok(self.report(
            file,
            archive.file_name(config.artifact_name(), &config.version),
        ))
    }

    fn report(&self, path: PathBuf, suggested_name: String) -> ArtifactRecord {
        let record = ArtifactRecord::new(path, suggested_name);
        self.ctx.sink.artifact_created(&record);
        record
    }
}
