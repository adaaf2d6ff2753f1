//! Signing of application bundles and installer packages
//!
//! The orchestrator owns the run's [`CodeSigningInfo`], computed lazily on the
//! first signing call and shared by the direct and App Store variants.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use macpack_core::{
    resources, ArtifactRecord, ArtifactSink, BuildResources, CleanupTasks, Config, MacOptions,
    SignOverrides, SigningEnv,
};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::error::{Result, SigningError};
use crate::identity::CertificateClass;
use crate::keychain::{CodeSigningInfo, CredentialBundle, KeychainManager};
use crate::options::{FlatOptions, SignOptions, SignPlatform};
use crate::resolver::IdentityResolver;
use crate::security::SecurityTool;
use crate::signer::ExternalSigner;

/// The external tools signing depends on
#[derive(Clone)]
pub struct SigningTools {
    pub security: Arc<dyn SecurityTool>,
    pub signer: Arc<dyn ExternalSigner>,
}

/// Product facts the orchestrator needs from configuration
#[derive(Debug, Clone)]
struct Product {
    product_name: String,
    artifact_name: String,
    version: String,
    mac: MacOptions,
    overrides: SignOverrides,
}

/// Signs application bundles for one packaging run
pub struct SigningOrchestrator {
    product: Product,
    project_dir: PathBuf,
    resources: BuildResources,
    bundle: CredentialBundle,
    env: SigningEnv,
    keychains: KeychainManager,
    resolver: IdentityResolver,
    signer: Arc<dyn ExternalSigner>,
    sink: Arc<dyn ArtifactSink>,
    info: OnceCell<Option<CodeSigningInfo>>,
}

impl SigningOrchestrator {
    /// Create an orchestrator.
    ///
    /// Fails immediately when a certificate link lacks its password.
    /// Relative entitlements paths are resolved against `project_dir`.
    pub fn new(
        config: &Config,
        project_dir: impl Into<PathBuf>,
        resources: BuildResources,
        env: SigningEnv,
        tools: SigningTools,
        sink: Arc<dyn ArtifactSink>,
        cleanup: CleanupTasks,
    ) -> Result<Self> {
        let bundle = CredentialBundle::resolve(&config.signing, &env);
        bundle.validate()?;

        Ok(Self {
            product: Product {
                product_name: config.product_name.clone(),
                artifact_name: config.artifact_name().to_string(),
                version: config.version.clone(),
                mac: config.mac.clone(),
                overrides: config.sign.clone(),
            },
            project_dir: project_dir.into(),
            resources,
            keychains: KeychainManager::new(Arc::clone(&tools.security), cleanup),
            resolver: IdentityResolver::new(tools.security, &env),
            bundle,
            env,
            signer: tools.signer,
            sink,
            info: OnceCell::new(),
        })
    }

    /// Path of the application bundle inside an output directory
    pub fn app_path(&self, app_out_dir: &Path) -> PathBuf {
        app_out_dir.join(format!("{}.app", self.product.product_name))
    }

    /// Signing info for the run, created on first use
    pub async fn code_signing_info(&self) -> Result<Option<CodeSigningInfo>> {
        self.info
            .get_or_try_init(|| self.keychains.create_store(&self.bundle))
            .await
            .cloned()
    }

    /// Sign the bundle in `app_out_dir`.
    ///
    /// `mas` carries the App Store options and selects that variant; the signed
    /// bundle is then flattened into an installer package, which is reported
    /// and returned. A direct build with no identity available stays unsigned.
    #[instrument(skip(self, mas), fields(mas = mas.is_some()))]
    pub async fn sign(
        &self,
        app_out_dir: &Path,
        mas: Option<&MacOptions>,
    ) -> Result<Option<ArtifactRecord>> {
        let is_mas = mas.is_some();
        let custom = mas.unwrap_or(&self.product.mac);

        let Some(info) = self.resolve_signing_info(custom, is_mas).await? else {
            return Ok(None);
        };

        let identity = match &info.name {
            Some(name) => name.clone(),
            None => {
                return Err(SigningError::InconsistentState(
                    "no application identity resolved".to_string(),
                ))
            }
        };
        info!(identity = %identity, "signing app");

        let app = self.app_path(app_out_dir);
        let platform = SignPlatform::for_variant(is_mas);
        let options = self
            .sign_options(app.clone(), platform, identity, info.keychain.clone(), custom);

        self.signer.sign(&options).await?;

        if !is_mas {
            return Ok(None);
        }

        let installer = info.installer_name.ok_or(SigningError::InstallerIdentityMissing)?;
        let version = &self.product.version;
        let pkg = app_out_dir.join(format!("{}-{}.pkg", self.product.product_name, version));
        info!(pkg = %pkg.display(), "flattening app into installer package");
        self.signer
            .flat(&FlatOptions {
                app,
                pkg: pkg.clone(),
                identity: installer,
                keychain: info.keychain,
                platform,
            })
            .await?;

        let record = ArtifactRecord::new(
            pkg,
            format!("{}-{}.pkg", self.product.artifact_name, version),
        );
        self.sink.artifact_created(&record);
        Ok(Some(record))
    }

    /// Settle which identities sign this variant; `None` means unsigned
    async fn resolve_signing_info(
        &self,
        custom: &MacOptions,
        is_mas: bool,
    ) -> Result<Option<CodeSigningInfo>> {
        let hint = custom.identity.as_deref();

        let Some(mut info) = self.code_signing_info().await? else {
            if self.env.csc_link.is_some() {
                return Err(SigningError::InconsistentState(
                    "CSC_LINK is set, but no signing keychain was created".to_string(),
                ));
            }

            let class = CertificateClass::application(is_mas);
            let Some(name) = self.resolver.find_identity(class, hint, None).await? else {
                if is_mas {
                    return Err(SigningError::NoIdentity);
                }
                warn!(
                    "App is not signed: CSC_LINK or CSC_NAME are not specified, and no valid identity is in the keychain"
                );
                return Ok(None);
            };

            let installer_name = if is_mas {
                let installer = self
                    .resolver
                    .find_identity(CertificateClass::MacDeveloperInstaller, hint, None)
                    .await?;
                Some(installer.ok_or(SigningError::InstallerIdentityMissing)?)
            } else {
                None
            };

            return Ok(Some(CodeSigningInfo {
                name: Some(name),
                installer_name,
                keychain: None,
            }));
        };

        if is_mas {
            if info.installer_name.is_none() {
                return Err(SigningError::InstallerIdentityMissing);
            }
            if info.name.is_none() {
                let keychain = info.keychain.as_deref();
                info.name = self
                    .resolver
                    .scan(CertificateClass::MacDeveloperApplication, keychain)
                    .await?;
                if info.name.is_none() {
                    return Err(SigningError::NoIdentity);
                }
            }
        } else if info.name.is_none() {
            return Err(SigningError::InconsistentState(
                "a certificate is configured, but it holds no application identity".to_string(),
            ));
        }

        Ok(Some(info))
    }

    fn sign_options(
        &self,
        app: PathBuf,
        platform: SignPlatform,
        identity: String,
        keychain: Option<String>,
        custom: &MacOptions,
    ) -> SignOptions {
        let is_mas = platform == SignPlatform::Mas;
        let mut options = SignOptions::new(app, platform, identity)
            .with_keychain(keychain)
            .apply_overrides(&self.product.overrides);

        // Variant options, then [sign], then the conventional resource file
        options.entitlements = custom
            .entitlements
            .as_deref()
            .or(options.entitlements.as_deref())
            .map(|path| self.project_path(path))
            .or_else(|| self.resources.resolve(resources::entitlements_file(is_mas)));
        options.entitlements_inherit = custom
            .entitlements_inherit
            .as_deref()
            .or(options.entitlements_inherit.as_deref())
            .map(|path| self.project_path(path))
            .or_else(|| {
                self.resources
                    .resolve(resources::inherit_entitlements_file(is_mas))
            });

        options
    }

    fn project_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}
