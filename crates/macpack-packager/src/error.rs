//! Error types for packaging

use macpack_core::ConfigError;
use macpack_signing::SigningError;
use thiserror::Error;

/// Result type for packaging operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Packaging errors
#[derive(Error, Debug)]
pub enum PackError {
    /// Configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Signing failed or signing configuration is invalid
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// Required tool not installed
    #[error("Required tool '{tool}' not found. {install_hint}")]
    ToolNotFound { tool: String, install_hint: String },

    /// External image or archive tool reported failure
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// The application bundle could not be built
    #[error("Build failed: {0}")]
    BuildFailed(String),

    /// Target not handled by this packager
    #[error("Target '{target}' is not supported on {platform}")]
    UnsupportedTarget { target: String, platform: String },

    /// A spawned packaging task panicked or was cancelled
    #[error("Packaging task failed: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// Create a tool not found error with install hint
    pub fn tool_not_found(tool: impl Into<String>, install_hint: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            install_hint: install_hint.into(),
        }
    }

    /// Whether the run failed on configuration rather than execution
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::Config(_) | Self::UnsupportedTarget { .. } => true,
            Self::Signing(e) => e.is_configuration_error(),
            _ => false,
        }
    }

    /// Get exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::UnsupportedTarget { .. } => 2,
            Self::Signing(e) if e.is_configuration_error() => 2,
            Self::ToolNotFound { .. } => 3,
            Self::Signing(_) => 10,
            Self::ToolFailed { .. } => 11,
            Self::BuildFailed(_) => 12,
            Self::Io(_) => 7,
            Self::Task(_) => 1,
        }
    }
}
