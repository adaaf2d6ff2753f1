//! Exit codes for the CLI

use macpack_core::ConfigError;
use macpack_packager::PackError;
use macpack_signing::SigningError;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Signing failed
pub const SIGNING_ERROR: i32 = 10;

/// Exit code for an error returned by a command
pub fn for_error(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<PackError>() {
        return e.exit_code();
    }
    if error.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_ERROR;
    }
    if let Some(e) = error.downcast_ref::<SigningError>() {
        return if e.is_configuration_error() {
            CONFIG_ERROR
        } else {
            SIGNING_ERROR
        };
    }
    ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let config = anyhow::Error::new(ConfigError::MissingField("version".to_string()));
        assert_eq!(for_error(&config), CONFIG_ERROR);

        let pack = anyhow::Error::new(PackError::tool_not_found("hdiutil", "macOS only"));
        assert_eq!(for_error(&pack), 3);

        let signing = anyhow::Error::new(SigningError::NoIdentity);
        assert_eq!(for_error(&signing), CONFIG_ERROR);

        let failed = anyhow::Error::new(SigningError::ToolFailed {
            tool: "codesign".to_string(),
            reason: "bad".to_string(),
        });
        assert_eq!(for_error(&failed), SIGNING_ERROR);

        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
    }
}
