//! Signing identity discovery

use std::sync::Arc;

use macpack_core::SigningEnv;
use tracing::{debug, instrument};

use crate::error::{Result, SigningError};
use crate::identity::{CertificateClass, RESERVED_PREFIXES};
use crate::security::SecurityTool;

/// Finds a signing identity by certificate class and optional name
pub struct IdentityResolver {
    security: Arc<dyn SecurityTool>,
    env_name: Option<String>,
}

impl IdentityResolver {
    /// `CSC_NAME` from `env` takes precedence over configured name hints
    pub fn new(security: Arc<dyn SecurityTool>, env: &SigningEnv) -> Self {
        Self {
            security,
            env_name: env.csc_name.clone(),
        }
    }

    /// Reject names that spell out a certificate class prefix
    pub fn check_reserved_prefix(name: &str) -> Result<()> {
        match RESERVED_PREFIXES.iter().find(|p| name.starts_with(**p)) {
            Some(prefix) => Err(SigningError::ReservedPrefix {
                prefix: (*prefix).to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Resolve an identity of `class`.
    ///
    /// With an explicit name (environment or `name_hint`), exactly
    /// `"<class>: <name>"` must exist or this fails. Without one, the first
    /// identity of `class` is returned, if any.
    #[instrument(skip(self, class), fields(class = %class))]
    pub async fn find_identity(
        &self,
        class: CertificateClass,
        name_hint: Option<&str>,
        keychain: Option<&str>,
    ) -> Result<Option<String>> {
        let explicit = self
            .env_name
            .as_deref()
            .or(name_hint)
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let Some(name) = explicit else {
            return self.scan(class, keychain).await;
        };

        Self::check_reserved_prefix(name)?;

        let wanted = class.qualify(name);
        let identities = self.security.find_identities(keychain).await?;
        let found = identities
            .into_iter()
            .find(|id| id.class == Some(class) && id.name == wanted);

        match found {
            Some(identity) => {
                debug!(identity = %identity.name, "explicit identity found");
                Ok(Some(identity.name))
            }
            None => Err(SigningError::IdentityNotFound(name.to_string())),
        }
    }

    /// First identity of `class` in listing order
    pub async fn scan(
        &self,
        class: CertificateClass,
        keychain: Option<&str>,
    ) -> Result<Option<String>> {
        let identities = self.security.find_identities(keychain).await?;
        let found = identities
            .into_iter()
            .find(|id| id.class == Some(class))
            .map(|id| id.name);
        debug!(class = %class, identity = ?found, "scanned keychain");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SigningIdentity;
    use crate::testing::FakeSecurity;

    fn security() -> Arc<FakeSecurity> {
        let identities = [
            ("Developer ID Installer: Acme (T1)", "A1"),
            ("Developer ID Application: Beta Ltd (T2)", "B2"),
            ("Developer ID Application: Acme (T1)", "C3"),
            ("3rd Party Mac Developer Application: Acme (T1)", "D4"),
        ]
        .into_iter()
        .map(|(name, fp)| SigningIdentity {
            fingerprint: fp.to_string(),
            class: CertificateClass::of_identity_name(name),
            name: name.to_string(),
            team_id: None,
        })
        .collect();
        Arc::new(FakeSecurity::with_identities(identities))
    }

    #[tokio::test]
    async fn test_scan_returns_first_of_class() {
        let resolver = IdentityResolver::new(security(), &SigningEnv::default());
        for _ in 0..3 {
            let found = resolver
                .find_identity(CertificateClass::DeveloperIdApplication, None, None)
                .await
                .unwrap();
            assert_eq!(found.as_deref(), Some("Developer ID Application: Beta Ltd (T2)"));
        }
    }

    #[tokio::test]
    async fn test_scan_no_match() {
        let resolver = IdentityResolver::new(security(), &SigningEnv::default());
        let found = resolver
            .find_identity(CertificateClass::MacDeveloperInstaller, Some("  "), None)
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_explicit_name_exact_match() {
        let resolver = IdentityResolver::new(security(), &SigningEnv::default());
        let found = resolver
            .find_identity(
                CertificateClass::DeveloperIdApplication,
                Some(" Acme (T1) "),
                None,
            )
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("Developer ID Application: Acme (T1)"));
    }

    #[tokio::test]
    async fn test_explicit_name_not_found_is_fatal() {
        let resolver = IdentityResolver::new(security(), &SigningEnv::default());
        let err = resolver
            .find_identity(CertificateClass::DeveloperIdApplication, Some("Acme"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::IdentityNotFound(ref n) if n == "Acme"));
    }

    #[tokio::test]
    async fn test_env_name_overrides_hint() {
        let env = SigningEnv {
            csc_name: Some("Beta Ltd (T2)".to_string()),
            ..Default::default()
        };
        let resolver = IdentityResolver::new(security(), &env);
        let found = resolver
            .find_identity(
                CertificateClass::DeveloperIdApplication,
                Some("Acme (T1)"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("Developer ID Application: Beta Ltd (T2)"));
    }

    #[tokio::test]
    async fn test_reserved_prefix_rejected_before_lookup() {
        let security = security();
        let resolver = IdentityResolver::new(security.clone(), &SigningEnv::default());

        for prefix in RESERVED_PREFIXES {
            let name = format!("{} Acme (T1)", prefix);
            let err = resolver
                .find_identity(CertificateClass::DeveloperIdApplication, Some(&name), None)
                .await
                .unwrap_err();
            match err {
                SigningError::ReservedPrefix { prefix: p } => assert_eq!(p, prefix),
                other => panic!("unexpected error: {other}"),
            }
        }
        assert!(security.calls().is_empty());
    }
}
