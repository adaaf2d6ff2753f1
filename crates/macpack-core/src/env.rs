//! Environment overrides for signing
//!
//! Read once per run; the values never change while the run is in progress.

use std::fmt;

/// Certificate locator (path or URL of a .p12 bundle)
pub const CSC_LINK: &str = "CSC_LINK";
/// Password for the certificate bundle
pub const CSC_KEY_PASSWORD: &str = "CSC_KEY_PASSWORD";
/// Explicit signing identity name
pub const CSC_NAME: &str = "CSC_NAME";
/// Installer certificate locator
pub const CSC_INSTALLER_LINK: &str = "CSC_INSTALLER_LINK";
/// Password for the installer certificate bundle
pub const CSC_INSTALLER_KEY_PASSWORD: &str = "CSC_INSTALLER_KEY_PASSWORD";

/// Signing configuration supplied through the environment
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SigningEnv {
    pub csc_link: Option<String>,
    pub csc_key_password: Option<String>,
    pub csc_name: Option<String>,
    pub csc_installer_link: Option<String>,
    pub csc_installer_key_password: Option<String>,
}

impl SigningEnv {
    /// Read the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            csc_link: get(CSC_LINK),
            csc_key_password: get(CSC_KEY_PASSWORD),
            csc_name: get(CSC_NAME),
            csc_installer_link: get(CSC_INSTALLER_LINK),
            csc_installer_key_password: get(CSC_INSTALLER_KEY_PASSWORD),
        }
    }
}

impl fmt::Debug for SigningEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningEnv")
            .field("csc_link", &self.csc_link)
            .field("csc_key_password", &self.csc_key_password.as_ref().map(|_| "***"))
            .field("csc_name", &self.csc_name)
            .field("csc_installer_link", &self.csc_installer_link)
            .field(
                "csc_installer_key_password",
                &self.csc_installer_key_password.as_ref().map(|_| "***"),
            )
            .finish()
    }
}
