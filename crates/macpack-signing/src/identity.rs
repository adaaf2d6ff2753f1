//! Signing identities and certificate classes

use serde::Serialize;
use std::fmt;

/// Certificate classes issued for macOS distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CertificateClass {
    /// Direct distribution, application signing
    DeveloperIdApplication,
    /// Direct distribution, installer signing
    DeveloperIdInstaller,
    /// Mac App Store, application signing
    MacDeveloperApplication,
    /// Mac App Store, installer signing
    MacDeveloperInstaller,
}

/// Prefixes the platform applies to identity names of each class
pub const RESERVED_PREFIXES: [&str; 4] = [
    "Developer ID Application:",
    "3rd Party Mac Developer Application:",
    "Developer ID Installer:",
    "3rd Party Mac Developer Installer:",
];

impl CertificateClass {
    pub const ALL: [CertificateClass; 4] = [
        Self::DeveloperIdApplication,
        Self::MacDeveloperApplication,
        Self::DeveloperIdInstaller,
        Self::MacDeveloperInstaller,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeveloperIdApplication => "Developer ID Application",
            Self::DeveloperIdInstaller => "Developer ID Installer",
            Self::MacDeveloperApplication => "3rd Party Mac Developer Application",
            Self::MacDeveloperInstaller => "3rd Party Mac Developer Installer",
        }
    }

    /// Application-signing class for the given variant
    pub fn application(mas: bool) -> Self {
        if mas {
            Self::MacDeveloperApplication
        } else {
            Self::DeveloperIdApplication
        }
    }

    /// Full identity name for a short name, e.g. `Developer ID Application: Acme`
    pub fn qualify(&self, name: &str) -> String {
        format!("{}: {}", self.as_str(), name)
    }

    /// Class of a full identity name, if it carries a known prefix
    pub fn of_identity_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| name.starts_with(&format!("{}:", class.as_str())))
    }
}

impl fmt::Display for CertificateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A code signing identity reported by the keychain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningIdentity {
    /// SHA-1 fingerprint
    pub fingerprint: String,

    /// Full identity name
    pub name: String,

    /// Certificate class, when the name carries a known prefix
    pub class: Option<CertificateClass>,

    /// Team ID (trailing parenthesized part of the name)
    pub team_id: Option<String>,
}

impl SigningIdentity {
    /// Parse one line of `security find-identity` output.
    ///
    /// Format: `  1) FINGERPRINT "Name"`, optionally followed by a status.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        let (_, rest) = line.split_once(") ")?;
        let rest = rest.trim_start();
        let (fingerprint, rest) = rest.split_once(' ')?;

        let name_start = rest.find('"')?;
        let name_end = rest[name_start + 1..].find('"')? + name_start + 1;
        let name = rest[name_start + 1..name_end].to_string();

        // Expired or revoked identities are flagged after the name
        if rest[name_end + 1..].contains("CSSMERR_") {
            return None;
        }

        let team_id = match (name.rfind('('), name.rfind(')')) {
            (Some(start), Some(end)) if start < end => Some(name[start + 1..end].to_string()),
            _ => None,
        };

        Some(Self {
            fingerprint: fingerprint.to_string(),
            class: CertificateClass::of_identity_name(&name),
            name,
            team_id,
        })
    }

    /// Parse full `security find-identity` output, keeping listing order
    pub fn parse_listing(output: &str) -> Vec<Self> {
        let mut identities: Vec<Self> = Vec::new();
        for identity in output.lines().filter_map(Self::parse_line) {
            // The valid-identities section can repeat entries from the policy section
            if !identities.iter().any(|i| i.fingerprint == identity.fingerprint) {
                identities.push(identity);
            }
        }
        identities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"Policy: Code Signing
  Matching identities
  1) 5E4B1E2B3C4D5E6F708192A3B4C5D6E7F8091A2B "Developer ID Application: Acme Corp (TEAM123456)"
  2) 0A1B2C3D4E5F60718293A4B5C6D7E8F901234567 "3rd Party Mac Developer Application: Acme Corp (TEAM123456)"
  3) 1111111111111111111111111111111111111111 "Developer ID Application: Old Corp (OLD1234567)" (CSSMERR_TP_CERT_EXPIRED)
     3 identities found

  Valid identities only
  1) 5E4B1E2B3C4D5E6F708192A3B4C5D6E7F8091A2B "Developer ID Application: Acme Corp (TEAM123456)"
  2) 0A1B2C3D4E5F60718293A4B5C6D7E8F901234567 "3rd Party Mac Developer Application: Acme Corp (TEAM123456)"
     2 valid identities found
"#;

    #[test]
    fn test_parse_identity_line() {
        let line = r#"  1) ABC123DEF456 "Developer ID Application: My Company (TEAMID123)""#;
        let id = SigningIdentity::parse_line(line).unwrap();

        assert_eq!(id.fingerprint, "ABC123DEF456");
        assert_eq!(id.name, "Developer ID Application: My Company (TEAMID123)");
        assert_eq!(id.class, Some(CertificateClass::DeveloperIdApplication));
        assert_eq!(id.team_id.as_deref(), Some("TEAMID123"));
    }

    #[test]
    fn test_parse_skips_non_identity_lines() {
        assert!(SigningIdentity::parse_line("Policy: Code Signing").is_none());
        assert!(SigningIdentity::parse_line("     2 valid identities found").is_none());
    }

    #[test]
    fn test_parse_listing_dedupes_and_drops_invalid() {
        let identities = SigningIdentity::parse_listing(LISTING);
        assert_eq!(identities.len(), 2);
        assert_eq!(
            identities[1].class,
            Some(CertificateClass::MacDeveloperApplication)
        );
    }

    #[test]
    fn test_qualify_and_prefixes() {
        let class = CertificateClass::MacDeveloperInstaller;
        assert_eq!(class.qualify("Acme"), "3rd Party Mac Developer Installer: Acme");
        for class in CertificateClass::ALL {
            assert!(RESERVED_PREFIXES.contains(&format!("{}:", class.as_str()).as_str()));
        }
        assert_eq!(
            CertificateClass::application(true),
            CertificateClass::MacDeveloperApplication
        );
    }
}
