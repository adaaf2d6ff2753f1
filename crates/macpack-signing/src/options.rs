//! Options passed to the external signer

use std::fmt;
use std::path::PathBuf;

use macpack_core::SignOverrides;
use serde::Serialize;
use tracing::warn;

/// Platform discriminator for a signing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignPlatform {
    /// Direct distribution
    Darwin,
    /// Mac App Store
    Mas,
}

impl SignPlatform {
    pub fn for_variant(mas: bool) -> Self {
        if mas {
            Self::Mas
        } else {
            Self::Darwin
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Mas => "mas",
        }
    }
}

impl fmt::Display for SignPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for signing one application bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignOptions {
    /// The `.app` bundle
    pub app: PathBuf,
    pub platform: SignPlatform,
    pub identity: String,
    pub entitlements: Option<PathBuf>,
    pub entitlements_inherit: Option<PathBuf>,
    pub keychain: Option<String>,
    pub hardened_runtime: bool,
    pub gatekeeper_assess: bool,
}

impl SignOptions {
    pub fn new(app: PathBuf, platform: SignPlatform, identity: String) -> Self {
        Self {
            app,
            platform,
            identity,
            entitlements: None,
            entitlements_inherit: None,
            keychain: None,
            hardened_runtime: false,
            gatekeeper_assess: false,
        }
    }

    pub fn with_keychain(mut self, keychain: Option<String>) -> Self {
        self.keychain = keychain;
        self
    }

    /// Apply operator overrides.
    ///
    /// `platform` and `keychain` are computed and are never replaced; an
    /// override that sets either is ignored with a warning.
    pub fn apply_overrides(mut self, overrides: &SignOverrides) -> Self {
        if let Some(identity) = &overrides.identity {
            self.identity = identity.clone();
        }
        if let Some(entitlements) = &overrides.entitlements {
            self.entitlements = Some(entitlements.clone());
        }
        if let Some(inherit) = &overrides.entitlements_inherit {
            self.entitlements_inherit = Some(inherit.clone());
        }
        if let Some(hardened) = overrides.hardened_runtime {
            self.hardened_runtime = hardened;
        }
        if let Some(assess) = overrides.gatekeeper_assess {
            self.gatekeeper_assess = assess;
        }

        if let Some(platform) = &overrides.platform {
            warn!(
                requested = %platform,
                using = %self.platform,
                "sign.platform is computed from the build variant; override ignored"
            );
        }
        if let Some(keychain) = &overrides.keychain {
            warn!(
                requested = %keychain,
                using = ?self.keychain,
                "sign.keychain is computed from the signing credentials; override ignored"
            );
        }

        self
    }
}

/// Parameters for flattening a signed bundle into an installer package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatOptions {
    pub app: PathBuf,
    /// Output `.pkg` path
    pub pkg: PathBuf,
    /// Installer identity
    pub identity: String,
    pub keychain: Option<String>,
    pub platform: SignPlatform,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SignOptions {
        SignOptions::new(
            PathBuf::from("/out/mac/App.app"),
            SignPlatform::Darwin,
            "Developer ID Application: Acme".to_string(),
        )
        .with_keychain(Some("csc-1.keychain".to_string()))
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = SignOverrides {
            identity: Some("Developer ID Application: Other".to_string()),
            entitlements: Some(PathBuf::from("custom.plist")),
            hardened_runtime: Some(true),
            ..Default::default()
        };
        let options = base().apply_overrides(&overrides);
        assert_eq!(options.identity, "Developer ID Application: Other");
        assert_eq!(options.entitlements, Some(PathBuf::from("custom.plist")));
        assert!(options.hardened_runtime);
        assert!(!options.gatekeeper_assess);
    }

    #[test]
    fn test_platform_and_keychain_stay_computed() {
        let overrides = SignOverrides {
            platform: Some("mas".to_string()),
            keychain: Some("login.keychain".to_string()),
            ..Default::default()
        };
        let options = base().apply_overrides(&overrides);
        assert_eq!(options.platform, SignPlatform::Darwin);
        assert_eq!(options.keychain.as_deref(), Some("csc-1.keychain"));
    }

    #[test]
    fn test_platform_for_variant() {
        assert_eq!(SignPlatform::for_variant(true).as_str(), "mas");
        assert_eq!(SignPlatform::for_variant(false).as_str(), "darwin");
    }
}
