//! Configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::target::TargetSet;

/// Main configuration for macpack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Human-facing product name; also the `.app` bundle name
    pub product_name: String,

    /// Package name used for suggested artifact names (defaults to the product name)
    pub name: Option<String>,

    /// Application version (semver)
    pub version: String,

    /// Requested distribution targets
    pub targets: TargetSet,

    /// Compression preference for disk images and archives
    pub compression: Compression,

    /// Directory layout
    pub directories: DirectoriesConfig,

    /// Options for the direct-distribution variant
    pub mac: MacOptions,

    /// Options for the Mac App Store variant, layered over `mac`
    pub mas: MacOptions,

    /// Operator-supplied signing overrides
    pub sign: SignOverrides,

    /// Signing credentials
    pub signing: CredentialsConfig,
}

impl Config {
    /// Name used for suggested artifact names
    pub fn artifact_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.product_name)
    }

    /// Effective options for the App Store variant
    pub fn mas_options(&self) -> MacOptions {
        self.mac.merged_with(&self.mas)
    }
}

/// Compression preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Normal,
    /// No compression
    Store,
    Maximum,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Store => "store",
            Self::Maximum => "maximum",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory layout, relative to the project directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    /// Build resources (icons, entitlements, backgrounds)
    pub build_resources: PathBuf,

    /// Output directory for packaged artifacts
    pub output: PathBuf,

    /// Prebuilt application bundle to package
    pub app: Option<PathBuf>,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            build_resources: PathBuf::from("build"),
            output: PathBuf::from("dist"),
            app: None,
        }
    }
}

/// Per-variant macOS options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacOptions {
    /// Signing identity name, without the certificate class prefix
    pub identity: Option<String>,

    /// Primary entitlements file
    pub entitlements: Option<PathBuf>,

    /// Entitlements inherited by nested code
    pub entitlements_inherit: Option<PathBuf>,

    /// Disk image icon
    pub icon: Option<PathBuf>,

    /// Disk image background
    pub background: Option<PathBuf>,

    /// Disk image overrides
    pub dmg: DmgOptions,
}

impl MacOptions {
    /// Layer `overlay` over `self`; values set in the overlay win
    pub fn merged_with(&self, overlay: &MacOptions) -> MacOptions {
        MacOptions {
            identity: overlay.identity.clone().or_else(|| self.identity.clone()),
            entitlements: overlay
                .entitlements
                .clone()
                .or_else(|| self.entitlements.clone()),
            entitlements_inherit: overlay
                .entitlements_inherit
                .clone()
                .or_else(|| self.entitlements_inherit.clone()),
            icon: overlay.icon.clone().or_else(|| self.icon.clone()),
            background: overlay.background.clone().or_else(|| self.background.clone()),
            dmg: DmgOptions {
                title: overlay.dmg.title.clone().or_else(|| self.dmg.title.clone()),
                icon_size: overlay.dmg.icon_size.or(self.dmg.icon_size),
                format: overlay.dmg.format.clone().or_else(|| self.dmg.format.clone()),
            },
        }
    }
}

/// Disk image overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmgOptions {
    /// Volume title
    pub title: Option<String>,

    /// Icon size in points
    pub icon_size: Option<u32>,

    /// hdiutil image format (UDBZ, UDZO, UDRO, ...)
    pub format: Option<String>,
}

/// Operator-supplied signing overrides.
///
/// These take precedence over computed signing options, except `platform` and
/// `keychain` which are always computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignOverrides {
    pub identity: Option<String>,
    pub entitlements: Option<PathBuf>,
    pub entitlements_inherit: Option<PathBuf>,
    pub hardened_runtime: Option<bool>,
    pub gatekeeper_assess: Option<bool>,
    pub platform: Option<String>,
    pub keychain: Option<String>,
}

/// Signing credential locators from configuration
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Path or URL of the application signing certificate (.p12)
    pub cert_link: Option<String>,

    /// Password for `cert_link`
    pub cert_password: Option<String>,

    /// Path or URL of the installer certificate (.p12)
    pub installer_link: Option<String>,

    /// Password for `installer_link`
    pub installer_password: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::BuildTarget;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.targets.as_slice(), &[BuildTarget::Default]);
        assert_eq!(config.compression, Compression::Normal);
        assert_eq!(config.directories.build_resources, PathBuf::from("build"));
        assert_eq!(config.directories.output, PathBuf::from("dist"));
    }

    #[test]
    fn test_artifact_name_falls_back_to_product_name() {
        let mut config = Config {
            product_name: "My App".to_string(),
            ..Default::default()
        };
        assert_eq!(config.artifact_name(), "My App");

        config.name = Some("my-app".to_string());
        assert_eq!(config.artifact_name(), "my-app");

        config.name = Some(String::new());
        assert_eq!(config.artifact_name(), "My App");
    }

    #[test]
    fn test_mas_options_overlay() {
        let config = Config {
            mac: MacOptions {
                identity: Some("Acme".to_string()),
                entitlements: Some(PathBuf::from("mac.plist")),
                icon: Some(PathBuf::from("icon.icns")),
                ..Default::default()
            },
            mas: MacOptions {
                entitlements: Some(PathBuf::from("mas.plist")),
                ..Default::default()
            },
            ..Default::default()
        };

        let mas = config.mas_options();
        assert_eq!(mas.identity.as_deref(), Some("Acme"));
        assert_eq!(mas.entitlements, Some(PathBuf::from("mas.plist")));
        assert_eq!(mas.icon, Some(PathBuf::from("icon.icns")));
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = CredentialsConfig {
            cert_link: Some("/certs/app.p12".to_string()),
            cert_password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("/certs/app.p12"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_toml() {
        let toml_str = r#"
product_name = "App"
version = "1.2.3"
targets = ["dmg", "zip"]
compression = "store"

[directories]
output = "out"

[mac]
identity = "Acme Corp"

[mac.dmg]
icon_size = 96

[sign]
hardened_runtime = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.product_name, "App");
        assert_eq!(config.compression, Compression::Store);
        assert_eq!(config.directories.output, PathBuf::from("out"));
        assert_eq!(config.directories.build_resources, PathBuf::from("build"));
        assert_eq!(config.mac.dmg.icon_size, Some(96));
        assert_eq!(config.sign.hardened_runtime, Some(true));
        assert_eq!(config.targets.len(), 2);
    }
}
