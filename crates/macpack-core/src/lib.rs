//! macpack core - shared types for the macOS packaging pipeline
//!
//! This crate holds everything the signing and packaging crates agree on:
//! - Configuration loading and validation
//! - Build targets and architectures
//! - Artifact records and the sink they are reported to
//! - Build-resource probing
//! - Per-run cleanup tasks
//! - Environment signing overrides

pub mod artifact;
pub mod cleanup;
pub mod config;
pub mod env;
pub mod error;
pub mod resources;
pub mod target;

pub use artifact::{ArtifactCollector, ArtifactRecord, ArtifactSink};
pub use cleanup::{CleanupTask, CleanupTasks};
pub use config::{
    Compression, Config, CredentialsConfig, DirectoriesConfig, DmgOptions, MacOptions,
    SignOverrides,
};
pub use env::SigningEnv;
pub use error::{ConfigError, Result};
pub use resources::BuildResources;
pub use target::{Arch, BuildTarget, TargetSet};
