//! Ephemeral keychain management
//!
//! When a certificate bundle is configured, a fresh keychain is created for the
//! run, the certificates are imported into it, and a cleanup task deleting it is
//! registered before creation starts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use macpack_core::{CleanupTask, CleanupTasks, CredentialsConfig, SigningEnv};
use rand::RngCore;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::error::{Result, SigningError};
use crate::identity::CertificateClass;
use crate::security::SecurityTool;

/// Certificate locators and passwords for one run
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub cert_link: Option<String>,
    pub cert_password: Option<String>,
    pub installer_link: Option<String>,
    pub installer_password: Option<String>,
}

impl CredentialBundle {
    /// Configuration first, then the environment
    pub fn resolve(config: &CredentialsConfig, env: &SigningEnv) -> Self {
        Self {
            cert_link: config.cert_link.clone().or_else(|| env.csc_link.clone()),
            cert_password: config
                .cert_password
                .clone()
                .or_else(|| env.csc_key_password.clone()),
            installer_link: config
                .installer_link
                .clone()
                .or_else(|| env.csc_installer_link.clone()),
            installer_password: config
                .installer_password
                .clone()
                .or_else(|| env.csc_installer_key_password.clone()),
        }
    }

    /// Whether an application certificate was supplied
    pub fn is_configured(&self) -> bool {
        self.cert_link.is_some()
    }

    /// Check that every link has its password
    pub fn validate(&self) -> Result<()> {
        if self.cert_link.is_some() && self.cert_password.is_none() {
            return Err(SigningError::MissingPassword {
                credential: "Certificate".to_string(),
            });
        }
        if self.installer_link.is_some() && self.installer_password.is_none() {
            return Err(SigningError::MissingPassword {
                credential: "Installer certificate".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("cert_link", &self.cert_link)
            .field("cert_password", &self.cert_password.as_ref().map(|_| "***"))
            .field("installer_link", &self.installer_link)
            .field(
                "installer_password",
                &self.installer_password.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// Resolved signing material for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSigningInfo {
    /// Application signing identity
    pub name: Option<String>,

    /// Installer signing identity
    pub installer_name: Option<String>,

    /// Keychain holding the identities
    pub keychain: Option<String>,
}

/// Creates and tracks the run's ephemeral keychain
pub struct KeychainManager {
    security: Arc<dyn SecurityTool>,
    cleanup: CleanupTasks,
}

impl KeychainManager {
    pub fn new(security: Arc<dyn SecurityTool>, cleanup: CleanupTasks) -> Self {
        Self { security, cleanup }
    }

    /// Generate a unique keychain name
    pub fn generate_keychain_name() -> String {
        format!("csc-{}.keychain", uuid::Uuid::new_v4())
    }

    fn generate_password() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Create a keychain holding the bundle's certificates.
    ///
    /// Returns `None` without side effects when no certificate is configured.
    #[instrument(skip_all)]
    pub async fn create_store(&self, bundle: &CredentialBundle) -> Result<Option<CodeSigningInfo>> {
        bundle.validate()?;
        let (Some(cert_link), Some(cert_password)) = (&bundle.cert_link, &bundle.cert_password)
        else {
            debug!("no certificate configured, skipping keychain creation");
            return Ok(None);
        };

        let keychain = Self::generate_keychain_name();
        let password = Self::generate_password();

        let security = Arc::clone(&self.security);
        let name = keychain.clone();
        self.cleanup
            .register(CleanupTask::new(format!("delete keychain {}", keychain), move || async move {
                security
                    .delete_keychain(&name)
                    .await
                    .map_err(anyhow::Error::from)
            }));

        info!(keychain = %keychain, "creating temporary keychain");

        let mut certificates = vec![(cert_link.as_str(), cert_password.as_str())];
        if let (Some(link), Some(pw)) = (&bundle.installer_link, &bundle.installer_password) {
            certificates.push((link.as_str(), pw.as_str()));
        }

        let (fetched, created) = tokio::join!(
            fetch_all(&certificates),
            self.prepare_keychain(&keychain, &password)
        );
        let fetched = fetched?;
        created?;

        for (cert, (_, cert_password)) in fetched.iter().zip(&certificates) {
            debug!(keychain = %keychain, "importing certificate");
            self.security
                .import(&keychain, cert.path(), cert_password)
                .await?;
        }
        // Downloaded certificates are removed here on drop, success or not
        drop(fetched);

        let identities = self.security.find_identities(Some(&keychain)).await?;
        let first_of = |class: CertificateClass| {
            identities
                .iter()
                .find(|id| id.class == Some(class))
                .map(|id| id.name.clone())
        };

        let info = CodeSigningInfo {
            name: first_of(CertificateClass::DeveloperIdApplication)
                .or_else(|| first_of(CertificateClass::MacDeveloperApplication)),
            installer_name: first_of(CertificateClass::MacDeveloperInstaller),
            keychain: Some(keychain),
        };
        debug!(
            name = ?info.name,
            installer_name = ?info.installer_name,
            "imported signing identities"
        );
        Ok(Some(info))
    }

    async fn prepare_keychain(&self, keychain: &str, password: &str) -> Result<()> {
        self.security.create_keychain(keychain, password).await?;
        self.security.unlock_keychain(keychain, password).await?;
        self.security.set_keychain_settings(keychain).await
    }
}

/// A certificate file ready for import
#[derive(Debug)]
enum FetchedCertificate {
    Local(PathBuf),
    Downloaded(NamedTempFile),
}

impl FetchedCertificate {
    fn path(&self) -> &Path {
        match self {
            Self::Local(path) => path,
            Self::Downloaded(file) => file.path(),
        }
    }
}

async fn fetch_all(certificates: &[(&str, &str)]) -> Result<Vec<FetchedCertificate>> {
    let mut fetched = Vec::with_capacity(certificates.len());
    for (locator, _) in certificates {
        fetched.push(fetch_certificate(locator).await?);
    }
    Ok(fetched)
}

/// Resolve a certificate locator: an `https://` URL, a `file://` URL or a path
async fn fetch_certificate(locator: &str) -> Result<FetchedCertificate> {
    let download_error = |reason: String| SigningError::Download {
        locator: locator.to_string(),
        reason,
    };

    if locator.starts_with("https://") || locator.starts_with("http://") {
        debug!(locator, "downloading certificate");
        let response = reqwest::get(locator)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let file = tempfile::Builder::new()
            .prefix("csc-")
            .suffix(".p12")
            .tempfile()?;
        tokio::fs::write(file.path(), &bytes).await?;
        return Ok(FetchedCertificate::Downloaded(file));
    }

    let path = if locator.starts_with("file://") {
        url::Url::parse(locator)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| download_error("invalid file URL".to_string()))?
    } else {
        match locator.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(locator)),
            None => PathBuf::from(locator),
        }
    };

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(download_error("file does not exist".to_string()));
    }
    Ok(FetchedCertificate::Local(path))
}
