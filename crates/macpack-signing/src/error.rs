//! Error types for signing operations

use thiserror::Error;

/// Result type alias for signing operations
pub type Result<T> = std::result::Result<T, SigningError>;

/// Signing-related errors
#[derive(Debug, Error)]
pub enum SigningError {
    /// A certificate link was given without its key password
    #[error("{credential} link is set, but its key password is not")]
    MissingPassword { credential: String },

    /// An explicit identity name spells out the certificate class
    #[error(
        "Please remove prefix \"{prefix}\" from the specified name; the matching certificate is chosen automatically"
    )]
    ReservedPrefix { prefix: String },

    /// An explicit identity name has no match in the keychain
    #[error("Identity name \"{0}\" is specified, but no valid identity with this name is in the keychain")]
    IdentityNotFound(String),

    /// App Store build without an installer identity
    #[error(
        "Cannot find a valid installer certificate: set CSC_INSTALLER_LINK, or install a \"3rd Party Mac Developer Installer\" identity"
    )]
    InstallerIdentityMissing,

    /// No identity could be found where signing is mandatory
    #[error("App is not signed: CSC_LINK or CSC_NAME are not specified, and no valid identity is in the keychain")]
    NoIdentity,

    /// Signing state contradicts the configured credentials
    #[error("Inconsistent signing state: {0}")]
    InconsistentState(String),

    /// External tool reported failure
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// Keychain operation failed
    #[error("Keychain error: {0}")]
    Keychain(String),

    /// Certificate could not be fetched
    #[error("Failed to fetch certificate from {locator}: {reason}")]
    Download { locator: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SigningError {
    /// Whether this error comes from configuration rather than a tool failure
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingPassword { .. }
                | Self::ReservedPrefix { .. }
                | Self::IdentityNotFound(_)
                | Self::InstallerIdentityMissing
                | Self::NoIdentity
                | Self::InconsistentState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_prefix_message_names_prefix() {
        let err = SigningError::ReservedPrefix {
            prefix: "Developer ID Application:".to_string(),
        };
        assert!(err.to_string().contains("\"Developer ID Application:\""));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_tool_failure_is_not_configuration() {
        let err = SigningError::ToolFailed {
            tool: "codesign".to_string(),
            reason: "resource fork not allowed".to_string(),
        };
        assert!(!err.is_configuration_error());
        assert_eq!(err.to_string(), "codesign failed: resource fork not allowed");
    }
}
