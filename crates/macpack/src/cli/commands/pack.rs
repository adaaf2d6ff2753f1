//! Pack command - sign the app and create distributable artifacts

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use tracing::info;

use macpack_core::config::load_config_from_dir;
use macpack_core::{Arch, ArtifactRecord, Config, SigningEnv, TargetSet};
use macpack_packager::{
    CopyAppBuilder, DittoArchiver, HdiutilImageWriter, MacPackager, PackContext, PackRun,
    PackagerTools,
};
use macpack_signing::{CodesignSigner, DryRunSigner, ExternalSigner, SecurityCli, SigningTools};

use crate::cli::{output, Cli, OutputFormat};

/// Sign the app and create distributable artifacts
#[derive(Debug, Args)]
pub struct PackCommand {
    /// Targets to build, overriding the configuration (dmg, mas, zip, 7z, tar.gz, ...)
    #[arg(short, long = "target", value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Architecture (x64, ia32, arm64, universal); defaults to the host
    #[arg(long)]
    pub arch: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Prebuilt .app bundle to package
    #[arg(long)]
    pub app: Option<PathBuf>,

    /// Log signing operations instead of running codesign and productbuild
    #[arg(long)]
    pub dry_run: bool,
}

impl PackCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            targets = ?self.targets,
            arch = ?self.arch,
            dry_run = self.dry_run,
            "executing pack command"
        );
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let (mut config, config_path) = load_config_from_dir(&cwd)?;
        let project_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        if !self.targets.is_empty() {
            config.targets = TargetSet::parse(self.targets.as_slice())?;
        }
        let arch = match &self.arch {
            Some(name) => {
                Arch::parse(name).with_context(|| format!("unknown architecture '{}'", name))?
            }
            None => Arch::host(),
        };
        let out_dir = match &self.out {
            Some(out) => cwd.join(out),
            None => project_dir.join(&config.directories.output),
        };
        let app_source = self.app_source(&config, &cwd, &project_dir, &out_dir, arch);

        if cli.prints_text() {
            println!("{}", style("Packaging app...").bold());
            println!("{}", output::key_value("Product", &config.product_name));
            println!("{}", output::key_value("Version", &config.version));
            let targets: Vec<String> = config.targets.iter().map(|t| t.to_string()).collect();
            println!("{}", output::key_value("Targets", &targets.join(", ")));
            println!("{}", output::key_value("Arch", arch.as_str()));
            if self.dry_run {
                println!("  {}", style("DRY RUN").yellow().bold());
            }
            println!();
        }

        let signer: Arc<dyn ExternalSigner> = if self.dry_run {
            Arc::new(DryRunSigner)
        } else {
            Arc::new(CodesignSigner::new())
        };
        let tools = PackagerTools {
            signing: SigningTools {
                security: Arc::new(SecurityCli::new()),
                signer,
            },
            app_builder: Arc::new(CopyAppBuilder::new(app_source)),
            image_writer: Arc::new(HdiutilImageWriter::new()),
            archiver: Arc::new(DittoArchiver::new()),
        };

        let mut run = PackRun::new();
        let ctx = PackContext::load(config, &project_dir, run.sink()).await?;
        let env = SigningEnv::from_env();
        let packager = MacPackager::new(Arc::new(ctx), env, tools, run.cleanup())?;
        run.add_packager(Box::new(packager));

        let artifacts = run.execute(&out_dir, arch).await?;
        self.report(cli, &artifacts)
    }

    /// Bundle to stage: `--app`, then `[directories] app`, else the bundle
    /// already in the direct output directory
    fn app_source(
        &self,
        config: &Config,
        cwd: &Path,
        project_dir: &Path,
        out_dir: &Path,
        arch: Arch,
    ) -> PathBuf {
        if let Some(app) = &self.app {
            return cwd.join(app);
        }
        match &config.directories.app {
            Some(app) => project_dir.join(app),
            None => out_dir
                .join(format!("mac{}", arch.dir_suffix()))
                .join(format!("{}.app", config.product_name)),
        }
    }

    fn report(&self, cli: &Cli, artifacts: &[ArtifactRecord]) -> anyhow::Result<()> {
        match cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(artifacts)?);
            }
            OutputFormat::Text if !cli.quiet => {
                if artifacts.is_empty() {
                    output::warning("No artifacts were created");
                } else {
                    output::success(&format!("Created {} artifact(s)", artifacts.len()));
                    for artifact in artifacts {
                        println!(
                            "  {} {}",
                            output::path_style().apply_to(artifact.path().display()),
                            style(format!("({})", artifact.suggested_name())).dim()
                        );
                    }
                }
            }
            OutputFormat::Text => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(app: Option<&str>) -> PackCommand {
        PackCommand {
            targets: vec![],
            arch: None,
            out: None,
            app: app.map(PathBuf::from),
            dry_run: false,
        }
    }

    fn config() -> Config {
        Config {
            product_name: "App".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_app_source_defaults_to_output_dir() {
        let source = command(None).app_source(
            &config(),
            Path::new("/work"),
            Path::new("/project"),
            Path::new("/project/dist"),
            Arch::Arm64,
        );
        assert_eq!(source, PathBuf::from("/project/dist/mac-arm64/App.app"));
    }

    #[test]
    fn test_app_source_flag_wins_over_config() {
        let mut config = config();
        config.directories.app = Some(PathBuf::from("build/App.app"));

        let from_config = command(None).app_source(
            &config,
            Path::new("/work"),
            Path::new("/project"),
            Path::new("/out"),
            Arch::X64,
        );
        assert_eq!(from_config, PathBuf::from("/project/build/App.app"));

        let from_flag = command(Some("staging/App.app")).app_source(
            &config,
            Path::new("/work"),
            Path::new("/project"),
            Path::new("/out"),
            Arch::X64,
        );
        assert_eq!(from_flag, PathBuf::from("/work/staging/App.app"));
    }
}
