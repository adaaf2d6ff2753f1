//! macpack signing - keychains, identities and code signing for macOS bundles
//!
//! This crate provides:
//! - An ephemeral keychain per run, created from a certificate bundle
//! - Identity discovery by certificate class and optional name
//! - Orchestration of `codesign` and `productbuild` for direct and App Store builds

pub mod error;
pub mod identity;
pub mod keychain;
pub mod options;
pub mod orchestrator;
pub mod resolver;
pub mod security;
pub mod signer;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{Result, SigningError};
pub use identity::{CertificateClass, SigningIdentity, RESERVED_PREFIXES};
pub use keychain::{CodeSigningInfo, CredentialBundle, KeychainManager};
pub use options::{FlatOptions, SignOptions, SignPlatform};
pub use orchestrator::{SigningOrchestrator, SigningTools};
pub use resolver::IdentityResolver;
pub use security::{SecurityCli, SecurityTool};
pub use signer::{CodesignSigner, DryRunSigner, ExternalSigner};
