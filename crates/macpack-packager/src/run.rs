//! A single packaging run

use std::path::Path;
use std::sync::Arc;

use macpack_core::{Arch, ArtifactCollector, ArtifactRecord, CleanupTasks};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::error::{PackError, Result};
use crate::pipeline::DistributableTask;
use crate::traits::PlatformPackager;

/// Owns everything scoped to one run: packagers, produced artifacts and the
/// cleanup registry
pub struct PackRun {
    cleanup: CleanupTasks,
    sink: Arc<ArtifactCollector>,
    packagers: Vec<Box<dyn PlatformPackager>>,
}

impl Default for PackRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PackRun {
    pub fn new() -> Self {
        Self {
            cleanup: CleanupTasks::new(),
            sink: Arc::new(ArtifactCollector::new()),
            packagers: Vec::new(),
        }
    }

    /// Cleanup registry to hand to packagers of this run
    pub fn cleanup(&self) -> CleanupTasks {
        self.cleanup.clone()
    }

    /// Artifact sink to hand to packagers of this run
    pub fn sink(&self) -> Arc<ArtifactCollector> {
        Arc::clone(&self.sink)
    }

    pub fn add_packager(&mut self, packager: Box<dyn PlatformPackager>) {
        self.packagers.push(packager);
    }

    /// Pack every platform, create the deferred artifacts, then clean up.
    ///
    /// Cleanup runs whether or not packing succeeded. Returns every artifact
    /// reported during the run.
    #[instrument(skip(self, out_dir, arch), fields(arch = %arch, packagers = self.packagers.len()))]
    pub async fn execute(&self, out_dir: &Path, arch: Arch) -> Result<Vec<ArtifactRecord>> {
        let outcome = self.pack_all(out_dir, arch).await;

        let failures = self.cleanup.run_all().await;
        if failures > 0 {
            warn!(failures, "some cleanup tasks failed");
        }

        outcome?;
        let artifacts = self.sink.artifacts();
        info!(count = artifacts.len(), "packaging finished");
        Ok(artifacts)
    }

    async fn pack_all(&self, out_dir: &Path, arch: Arch) -> Result<()> {
        let mut deferred: Vec<DistributableTask> = Vec::new();
        for packager in &self.packagers {
            info!(platform = %packager.platform(), "packing");
            if let Some(task) = packager.pack(out_dir, arch).await? {
                deferred.push(task);
            }
        }

        let mut tasks = JoinSet::new();
        for task in deferred {
            tasks.spawn(task.run());
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| PackError::Task(e.to_string())).and_then(|r| r);
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PackContext, PackagerTools};
    use crate::pipeline::MacPackager;
    use crate::testing::{FakeAppBuilder, FakeArchiver, FakeImageWriter};
    use crate::traits::Platform;
    use async_trait::async_trait;
    use macpack_core::{
        BuildResources, CleanupTask, Config, CredentialsConfig, SigningEnv, TargetSet,
    };
    use macpack_signing::testing::{FakeSecurity, RecordingSigner};
    use macpack_signing::{SigningIdentity, SigningTools};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(targets: &[&str]) -> Config {
        Config {
            product_name: "App".to_string(),
            version: "1.2.3".to_string(),
            targets: TargetSet::parse(targets).unwrap(),
            ..Default::default()
        }
    }

    fn developer_id() -> FakeSecurity {
        let identity = SigningIdentity::parse_line(
            "  1) 0123456789ABCDEF0123456789ABCDEF01234567 \"Developer ID Application: Acme (TEAM1)\"",
        )
        .unwrap();
        FakeSecurity::with_identities(vec![identity])
    }

    fn mac_packager(run: &PackRun, targets: &[&str], signer: RecordingSigner) -> MacPackager {
        packager_with(run, config(targets), Arc::new(developer_id()), signer)
    }

    fn packager_with(
        run: &PackRun,
        config: Config,
        security: Arc<FakeSecurity>,
        signer: RecordingSigner,
    ) -> MacPackager {
        let ctx = PackContext::new(
            config,
            "/project",
            BuildResources::from_entries("/project/build", std::iter::empty::<&str>()),
            run.sink(),
        );
        let tools = PackagerTools {
            signing: SigningTools {
                security,
                signer: Arc::new(signer),
            },
            app_builder: Arc::new(FakeAppBuilder::default()),
            image_writer: Arc::new(FakeImageWriter::default()),
            archiver: Arc::new(FakeArchiver::default()),
        };
        MacPackager::new(Arc::new(ctx), SigningEnv::default(), tools, run.cleanup()).unwrap()
    }

    fn count_cleanup(run: &PackRun) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&counter);
        run.cleanup().register(CleanupTask::new("count", move || async move {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        counter
    }

    #[tokio::test]
    async fn test_execute_collects_artifacts() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut run = PackRun::new();
        let packager = mac_packager(&run, &["dmg", "zip"], RecordingSigner::default());
        run.add_packager(Box::new(packager));
        let cleaned = count_cleanup(&run);

        let artifacts = run.execute(temp.path(), Arch::X64).await.unwrap();

        let mut names: Vec<_> = artifacts
            .iter()
            .map(|a| a.suggested_name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["App-1.2.3-osx.zip", "App-1.2.3.dmg"]);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        assert!(run.cleanup().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_runs_on_failure() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut run = PackRun::new();
        let signer = RecordingSigner::failing("code object is not signed");
        let packager = mac_packager(&run, &["dmg"], signer);
        run.add_packager(Box::new(packager));
        let cleaned = count_cleanup(&run);

        let err = run.execute(temp.path(), Arch::X64).await.unwrap_err();

        assert_eq!(err.to_string(), "codesign failed: code object is not signed");
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        assert!(run.sink().is_empty());
    }

    #[tokio::test]
    async fn test_keychain_deleted_after_failed_run() {
        let temp = tempfile::TempDir::new().unwrap();
        let p12 = temp.path().join("dev.p12");
        std::fs::write(&p12, b"p12").unwrap();

        let mut config = config(&["dmg"]);
        config.signing = CredentialsConfig {
            cert_link: Some(p12.display().to_string()),
            cert_password: Some("secret".to_string()),
            ..Default::default()
        };

        let mut run = PackRun::new();
        let security = Arc::new(developer_id());
        let signer = RecordingSigner::failing("code object is not signed");
        let packager = packager_with(&run, config, security.clone(), signer);
        run.add_packager(Box::new(packager));

        run.execute(temp.path(), Arch::X64).await.unwrap_err();

        let calls = security.calls();
        let created = calls
            .iter()
            .find_map(|c| c.strip_prefix("create-keychain "))
            .unwrap();
        assert_eq!(
            calls.last().unwrap(),
            &format!("delete-keychain {}", created)
        );
    }

    struct FailingPackager;

    #[async_trait]
    impl PlatformPackager for FailingPackager {
        fn platform(&self) -> Platform {
            Platform::Linux
        }

        fn supported_targets(&self) -> &'static [&'static str] {
            &[]
        }

        async fn pack(&self, _out_dir: &Path, _arch: Arch) -> Result<Option<DistributableTask>> {
            Err(PackError::UnsupportedTarget {
                target: "AppImage".to_string(),
                platform: self.platform().to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_packager_error_stops_run() {
        let mut run = PackRun::new();
        run.add_packager(Box::new(FailingPackager));
        let cleaned = count_cleanup(&run);

        let err = run.execute(Path::new("/dist"), Arch::X64).await.unwrap_err();
        assert!(matches!(err, PackError::UnsupportedTarget { .. }));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }
}
