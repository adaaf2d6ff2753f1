//! In-memory fakes for the signing seams

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, SigningError};
use crate::identity::SigningIdentity;
use crate::options::{FlatOptions, SignOptions, SignPlatform};
use crate::security::SecurityTool;
use crate::signer::ExternalSigner;

/// [`SecurityTool`] that serves a fixed identity list and records calls
#[derive(Debug, Default)]
pub struct FakeSecurity {
    identities: Vec<SigningIdentity>,
    fail_create: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeSecurity {
    pub fn with_identities(identities: Vec<SigningIdentity>) -> Self {
        Self {
            identities,
            ..Default::default()
        }
    }

    /// A tool whose `create_keychain` always fails
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    /// Calls made so far, as `"<command> <keychain>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

#[async_trait]
impl SecurityTool for FakeSecurity {
    async fn create_keychain(&self, keychain: &str, _password: &str) -> Result<()> {
        self.record(format!("create-keychain {}", keychain));
        if self.fail_create {
            return Err(SigningError::Keychain("create-keychain failed".to_string()));
        }
        Ok(())
    }

    async fn unlock_keychain(&self, keychain: &str, _password: &str) -> Result<()> {
        self.record(format!("unlock-keychain {}", keychain));
        Ok(())
    }

    async fn set_keychain_settings(&self, keychain: &str) -> Result<()> {
        self.record(format!("set-keychain-settings {}", keychain));
        Ok(())
    }

    async fn import(&self, keychain: &str, p12: &Path, _password: &str) -> Result<()> {
        self.record(format!("import {} {}", keychain, p12.display()));
        Ok(())
    }

    async fn delete_keychain(&self, keychain: &str) -> Result<()> {
        self.record(format!("delete-keychain {}", keychain));
        Ok(())
    }

    async fn find_identities(&self, keychain: Option<&str>) -> Result<Vec<SigningIdentity>> {
        self.record(format!("find-identity {}", keychain.unwrap_or("default")));
        Ok(self.identities.clone())
    }
}

/// [`ExternalSigner`] that records every invocation
#[derive(Debug, Default)]
pub struct RecordingSigner {
    signed: Mutex<Vec<SignOptions>>,
    flattened: Mutex<Vec<FlatOptions>>,
    /// Failure reasons, for one platform or for every platform when `None`
    fail_sign: Vec<(Option<SignPlatform>, String)>,
}

impl RecordingSigner {
    /// A signer whose `sign` fails with the given reason
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_sign: vec![(None, reason.into())],
            ..Default::default()
        }
    }

    /// Also fail `sign` for `platform` with the given reason
    pub fn failing_for(mut self, platform: SignPlatform, reason: impl Into<String>) -> Self {
        self.fail_sign.push((Some(platform), reason.into()));
        self
    }

    pub fn signed(&self) -> Vec<SignOptions> {
        self.signed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn flattened(&self) -> Vec<FlatOptions> {
        self.flattened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ExternalSigner for RecordingSigner {
    async fn sign(&self, options: &SignOptions) -> Result<()> {
        self.signed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(options.clone());
        let failure = self
            .fail_sign
            .iter()
            .find(|(platform, _)| platform.map_or(true, |p| p == options.platform));
        match failure {
            Some((_, reason)) => Err(SigningError::ToolFailed {
                tool: "codesign".to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn flat(&self, options: &FlatOptions) -> Result<()> {
        self.flattened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(options.clone());
        Ok(())
    }
}
