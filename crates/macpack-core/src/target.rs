//! Build targets and architectures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A requested distribution target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildTarget {
    /// Platform-conventional formats: a disk image plus a `zip` compatible
    /// with the platform's own update mechanism
    Default,
    /// Disk image (.dmg)
    Dmg,
    /// Mac App Store installer package (.pkg)
    Mas,
    /// Any other archive format, named by its extension (`zip`, `7z`, `tar.gz`, ...)
    Archive(String),
}

impl BuildTarget {
    /// Parse a target name
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let name = s.trim().to_lowercase();
        match name.as_str() {
            "" => Err(ConfigError::invalid("targets", "target name cannot be empty")),
            "default" => Ok(Self::Default),
            "dmg" => Ok(Self::Dmg),
            "mas" => Ok(Self::Mas),
            other => {
                let valid = other
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.')
                    && !other.starts_with('.')
                    && !other.ends_with('.');
                if valid {
                    Ok(Self::Archive(other.to_string()))
                } else {
                    Err(ConfigError::invalid(
                        "targets",
                        format!("'{}' is not a valid target or archive format", s),
                    ))
                }
            }
        }
    }

    /// Target name as written in configuration
    pub fn as_str(&self) -> &str {
        match self {
            Self::Default => "default",
            Self::Dmg => "dmg",
            Self::Mas => "mas",
            Self::Archive(format) => format,
        }
    }

    /// Whether this is the Mac App Store target
    pub fn is_mas(&self) -> bool {
        matches!(self, Self::Mas)
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BuildTarget {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BuildTarget> for String {
    fn from(target: BuildTarget) -> Self {
        target.as_str().to_string()
    }
}

/// Ordered set of unique build targets.
///
/// Requesting nothing is the same as requesting `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<BuildTarget>", into = "Vec<BuildTarget>")]
pub struct TargetSet {
    targets: Vec<BuildTarget>,
}

impl TargetSet {
    /// Create a target set, dropping duplicates but keeping first-seen order
    pub fn new(targets: impl IntoIterator<Item = BuildTarget>) -> Self {
        let mut unique: Vec<BuildTarget> = Vec::new();
        for target in targets {
            if !unique.contains(&target) {
                unique.push(target);
            }
        }
        if unique.is_empty() {
            unique.push(BuildTarget::Default);
        }
        Self { targets: unique }
    }

    /// Parse a list of target names
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        let targets = names
            .iter()
            .map(|n| BuildTarget::parse(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(targets))
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildTarget> {
        self.targets.iter()
    }

    pub fn as_slice(&self) -> &[BuildTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn contains(&self, target: &BuildTarget) -> bool {
        self.targets.contains(target)
    }

    /// Whether the Mac App Store variant is requested
    pub fn has_mas(&self) -> bool {
        self.targets.iter().any(BuildTarget::is_mas)
    }

    /// Whether any direct-distribution target is requested
    pub fn has_non_mas(&self) -> bool {
        self.targets.iter().any(|t| !t.is_mas())
    }
}

impl Default for TargetSet {
    fn default() -> Self {
        Self::new([])
    }
}

impl From<Vec<BuildTarget>> for TargetSet {
    fn from(targets: Vec<BuildTarget>) -> Self {
        Self::new(targets)
    }
}

impl From<TargetSet> for Vec<BuildTarget> {
    fn from(set: TargetSet) -> Self {
        set.targets
    }
}

/// CPU architecture of the packaged app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[default]
    X64,
    Ia32,
    Arm64,
    Universal,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Ia32 => "ia32",
            Self::Arm64 => "arm64",
            Self::Universal => "universal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Some(Self::X64),
            "ia32" | "x86" | "i386" => Some(Self::Ia32),
            "arm64" | "aarch64" => Some(Self::Arm64),
            "universal" => Some(Self::Universal),
            _ => None,
        }
    }

    /// Architecture of the running host
    pub fn host() -> Self {
        Self::parse(std::env::consts::ARCH).unwrap_or_default()
    }

    /// Suffix appended to per-arch output directories (`x64` has none)
    pub fn dir_suffix(&self) -> String {
        match self {
            Self::X64 => String::new(),
            other => format!("-{}", other.as_str()),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
