//! macOS packager
//!
//! Builds and signs the direct-distribution bundle and, when requested, the
//! App Store variant. Both bundles are staged first and then signed side by
//! side; artifact creation for the direct bundle is handed back as a
//! [`DistributableTask`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use macpack_core::{Arch, ArtifactRecord, BuildTarget, CleanupTasks, SigningEnv};
use macpack_signing::{SignPlatform, SigningOrchestrator};
use tracing::{debug, info, instrument};

use crate::archive::ARCHIVE_FORMATS;
use crate::context::{PackContext, PackagerTools};
use crate::distributable::ArtifactPipeline;
use crate::error::{PackError, Result};
use crate::traits::{AppBuilder, BuildRequest, Platform, PlatformPackager};

/// Deferred creation of the direct bundle's distributable artifacts
pub struct DistributableTask {
    pipeline: ArtifactPipeline,
    out_dir: PathBuf,
    app_out_dir: PathBuf,
    arch: Arch,
}

impl DistributableTask {
    pub fn app_out_dir(&self) -> &Path {
        &self.app_out_dir
    }

    pub async fn run(self) -> Result<Vec<ArtifactRecord>> {
        self.pipeline
            .package_in_distributable_format(&self.out_dir, &self.app_out_dir, self.arch)
            .await
    }
}

/// [`PlatformPackager`] for macOS
pub struct MacPackager {
    ctx: Arc<PackContext>,
    signing: SigningOrchestrator,
    app_builder: Arc<dyn AppBuilder>,
    artifacts: ArtifactPipeline,
}

impl MacPackager {
    /// Names accepted in the target list
    pub const SUPPORTED_TARGETS: &'static [&'static str] =
        &["default", "dmg", "mas", "zip", "7z", "tar.gz", "tgz", "tar.bz2", "tar.xz"];

    /// Create a packager.
    ///
    /// Unknown targets and a certificate link without a password are rejected
    /// here, before any tool runs.
    pub fn new(
        ctx: Arc<PackContext>,
        env: SigningEnv,
        tools: PackagerTools,
        cleanup: CleanupTasks,
    ) -> Result<Self> {
        for target in ctx.config.targets.iter() {
            let known = match target {
                BuildTarget::Archive(format) => ARCHIVE_FORMATS.contains(&format.as_str()),
                _ => true,
            };
            if !known {
                return Err(PackError::UnsupportedTarget {
                    target: target.to_string(),
                    platform: Platform::MacOs.to_string(),
                });
            }
        }

        let signing = SigningOrchestrator::new(
            &ctx.config,
            ctx.project_dir.clone(),
            ctx.resources.clone(),
            env,
            tools.signing,
            Arc::clone(&ctx.sink),
            cleanup,
        )?;
        let artifacts =
            ArtifactPipeline::new(Arc::clone(&ctx), tools.image_writer, tools.archiver);

        Ok(Self {
            ctx,
            signing,
            app_builder: tools.app_builder,
            artifacts,
        })
    }

    pub fn signing(&self) -> &SigningOrchestrator {
        &self.signing
    }

    fn build_request(&self, app_out_dir: PathBuf, arch: Arch, mas: bool) -> BuildRequest {
        BuildRequest {
            app_out_dir,
            product_name: self.ctx.product_name().to_string(),
            arch,
            platform: SignPlatform::for_variant(mas),
            sign_in_build: !mas,
        }
    }

    fn direct_dir(&self, out_dir: &Path, arch: Arch) -> Option<PathBuf> {
        self.ctx
            .config
            .targets
            .has_non_mas()
            .then(|| out_dir.join(format!("mac{}", arch.dir_suffix())))
    }

    fn mas_dir(&self, out_dir: &Path) -> Option<PathBuf> {
        self.ctx.config.targets.has_mas().then(|| out_dir.join("mas"))
    }

    async fn build_variant(
        &self,
        app_out_dir: Option<&Path>,
        arch: Arch,
        mas: bool,
    ) -> Result<()> {
        let Some(app_out_dir) = app_out_dir else {
            return Ok(());
        };
        info!(dir = %app_out_dir.display(), mas, "building app");
        self.app_builder
            .build(&self.build_request(app_out_dir.to_path_buf(), arch, mas))
            .await
    }

    async fn sign_direct(
        &self,
        out_dir: &Path,
        app_out_dir: Option<PathBuf>,
        arch: Arch,
    ) -> Result<Option<DistributableTask>> {
        let Some(app_out_dir) = app_out_dir else {
            return Ok(None);
        };
        self.signing.sign(&app_out_dir, None).await?;

        Ok(Some(DistributableTask {
            pipeline: self.artifacts.clone(),
            out_dir: out_dir.to_path_buf(),
            app_out_dir,
            arch,
        }))
    }

    async fn sign_mas(&self, app_out_dir: Option<&Path>) -> Result<()> {
        let Some(app_out_dir) = app_out_dir else {
            return Ok(());
        };
        let mas_options = self.ctx.config.mas_options();
        if let Some(pkg) = self.signing.sign(app_out_dir, Some(&mas_options)).await? {
            debug!(pkg = %pkg.path().display(), "App Store package created");
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformPackager for MacPackager {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn supported_targets(&self) -> &'static [&'static str] {
        Self::SUPPORTED_TARGETS
    }

    #[instrument(skip(self, out_dir, arch), fields(arch = %arch))]
    async fn pack(&self, out_dir: &Path, arch: Arch) -> Result<Option<DistributableTask>> {
        let direct_dir = self.direct_dir(out_dir, arch);
        let mas_dir = self.mas_dir(out_dir);

        // Both bundles are staged before either is signed in place
        let (mas, direct) = tokio::join!(
            self.build_variant(mas_dir.as_deref(), arch, true),
            self.build_variant(direct_dir.as_deref(), arch, false)
        );
        mas?;
        direct?;

        let (mas, direct) = tokio::join!(
            self.sign_mas(mas_dir.as_deref()),
            self.sign_direct(out_dir, direct_dir, arch)
        );
        mas?;
        direct
    }
}
