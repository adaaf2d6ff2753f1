//! Keychain access through the `security` command-line tool

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SigningError};
use crate::identity::SigningIdentity;

/// Keychain operations used by the signing pipeline
#[async_trait]
pub trait SecurityTool: Send + Sync {
    /// Create a keychain protected by `password`
    async fn create_keychain(&self, keychain: &str, password: &str) -> Result<()>;

    async fn unlock_keychain(&self, keychain: &str, password: &str) -> Result<()>;

    /// Lock the keychain after an hour of inactivity and on sleep
    async fn set_keychain_settings(&self, keychain: &str) -> Result<()>;

    /// Import a PKCS#12 bundle, granting codesign and productbuild access
    async fn import(&self, keychain: &str, p12: &Path, password: &str) -> Result<()>;

    async fn delete_keychain(&self, keychain: &str) -> Result<()>;

    /// Valid code signing identities, in listing order.
    ///
    /// `None` searches the user's default keychain search list.
    async fn find_identities(&self, keychain: Option<&str>) -> Result<Vec<SigningIdentity>>;
}

/// [`SecurityTool`] backed by `/usr/bin/security`
#[derive(Debug, Clone)]
pub struct SecurityCli {
    security_path: PathBuf,
}

impl SecurityCli {
    pub fn new() -> Self {
        Self {
            security_path: PathBuf::from("/usr/bin/security"),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            security_path: path.into(),
        }
    }

    /// Run `security` and return its stdout.
    ///
    /// `redact` hides argument positions that carry passwords in the debug log.
    async fn run(&self, args: &[&str], redact: &[usize]) -> Result<String> {
        let logged: Vec<&str> = args
            .iter()
            .enumerate()
            .map(|(i, a)| if redact.contains(&i) { "***" } else { a })
            .collect();
        debug!(args = ?logged, "running security");

        let output = Command::new(&self.security_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let reason = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(SigningError::Keychain(format!(
                "security {} failed: {}",
                args.first().copied().unwrap_or_default(),
                reason.trim()
            )));
        }

        Ok(stdout)
    }
}

impl Default for SecurityCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecurityTool for SecurityCli {
    async fn create_keychain(&self, keychain: &str, password: &str) -> Result<()> {
        self.run(&["create-keychain", "-p", password, keychain], &[2])
            .await
            .map(|_| ())
    }

    async fn unlock_keychain(&self, keychain: &str, password: &str) -> Result<()> {
        self.run(&["unlock-keychain", "-p", password, keychain], &[2])
            .await
            .map(|_| ())
    }

    async fn set_keychain_settings(&self, keychain: &str) -> Result<()> {
        self.run(&["set-keychain-settings", "-t", "3600", "-u", keychain], &[])
            .await
            .map(|_| ())
    }

    async fn import(&self, keychain: &str, p12: &Path, password: &str) -> Result<()> {
        let p12 = p12.to_string_lossy();
        self.run(
            &[
                "import",
                &p12,
                "-k",
                keychain,
                "-T",
                "/usr/bin/codesign",
                "-T",
                "/usr/bin/productbuild",
                "-P",
                password,
            ],
            &[9],
        )
        .await
        .map(|_| ())
    }

    async fn delete_keychain(&self, keychain: &str) -> Result<()> {
        self.run(&["delete-keychain", keychain], &[]).await.map(|_| ())
    }

    async fn find_identities(&self, keychain: Option<&str>) -> Result<Vec<SigningIdentity>> {
        let mut args = vec!["find-identity", "-v", "-p", "codesigning"];
        if let Some(keychain) = keychain {
            args.push(keychain);
        }

        let stdout = self.run(&args, &[]).await?;
        let identities = SigningIdentity::parse_listing(&stdout);
        debug!(count = identities.len(), keychain, "found signing identities");
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let tool = SecurityCli::with_path("/nonexistent/security");
        let err = tool.find_identities(None).await.unwrap_err();
        assert!(matches!(err, SigningError::Io(_)));
    }
}
