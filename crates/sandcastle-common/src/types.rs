//! Domain primitive types used across the Sandcastle workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MEMORY_LIMIT, DEFAULT_NANO_CPUS, MIN_MEMORY_BYTES};
use crate::error::{Result, SandboxError};

/// One structured event from an image build, kept verbatim for diagnostics.
pub type BuildLogEvent = serde_json::Map<String, serde_json::Value>;

/// Engine-assigned identifier of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag of a built image, unique per build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageTag(String);

impl ImageTag {
    /// Creates an image tag from a string value.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memory ceiling and CPU quota applied to a sandbox container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in bytes.
    pub memory_bytes: u64,
    /// CPU quota in billionths of a core.
    pub nano_cpus: u64,
}

impl ResourceLimits {
    /// Builds limits from an engine-style memory string and a nano-CPU quota.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ResourceLimitInvalid` if the memory string does
    /// not parse or either value is outside what the engine accepts.
    pub fn parse(memory: &str, nano_cpus: u64) -> Result<Self> {
        let memory_bytes = parse_memory(memory).ok_or_else(|| SandboxError::ResourceLimitInvalid {
            message: format!("unparseable memory limit: {memory:?}"),
        })?;
        let limits = Self {
            memory_bytes,
            nano_cpus,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Checks the limits against the engine's accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ResourceLimitInvalid` when memory is below the
    /// engine minimum or the CPU quota is zero.
    pub fn validate(&self) -> Result<()> {
        if self.memory_bytes < MIN_MEMORY_BYTES {
            return Err(SandboxError::ResourceLimitInvalid {
                message: format!(
                    "memory limit {} bytes is below the minimum of {MIN_MEMORY_BYTES} bytes",
                    self.memory_bytes
                ),
            });
        }
        if self.nano_cpus == 0 {
            return Err(SandboxError::ResourceLimitInvalid {
                message: "cpu quota must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Renders the CPU quota as the decimal core count the engine CLI takes.
    #[must_use]
    pub fn cpus_decimal(&self) -> String {
        let whole = self.nano_cpus / 1_000_000_000;
        let frac = self.nano_cpus % 1_000_000_000;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{frac:09}");
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: parse_memory(DEFAULT_MEMORY_LIMIT).unwrap_or(500 * 1024 * 1024),
            nano_cpus: DEFAULT_NANO_CPUS,
        }
    }
}

/// Parses engine memory strings like `"500M"`, `"1g"`, `"512MiB"` into bytes.
///
/// Single-letter suffixes are binary multiples, matching the engine.
#[must_use]
#[allow(clippy::option_if_let_else)]
pub fn parse_memory(s: &str) -> Option<u64> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let (num_str, multiplier): (&str, u64) = if let Some(n) = lower.strip_suffix("gib") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("mib") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kib") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix("gb").or_else(|| lower.strip_suffix('g')) {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("mb").or_else(|| lower.strip_suffix('m')) {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kb").or_else(|| lower.strip_suffix('k')) {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        (lower.as_str(), 1)
    };
    num_str.trim().parse::<u64>().ok()?.checked_mul(multiplier)
}

/// Lifecycle state of a container as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerState {
    /// Container has been created but not yet started.
    Created,
    /// Container is actively running.
    Running,
    /// Container processes are frozen.
    Paused,
    /// Container is being restarted by the engine.
    Restarting,
    /// Container has exited.
    Stopped,
    /// Container could not be cleaned up by the engine.
    Dead,
}

impl ContainerState {
    /// Returns whether commands can be executed in this state.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Stopped => write!(f, "stopped"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

impl FromStr for ContainerState {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "restarting" => Ok(Self::Restarting),
            "exited" | "stopped" => Ok(Self::Stopped),
            "dead" | "removing" => Ok(Self::Dead),
            other => Err(SandboxError::Engine {
                operation: "inspect",
                message: format!("unknown container state {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_memory_engine_suffixes() {
        assert_eq!(parse_memory("500M"), Some(500 * 1024 * 1024));
        assert_eq!(parse_memory("1g"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_memory("64k"), Some(64 * 1024));
        assert_eq!(parse_memory("128MiB"), Some(128 * 1024 * 1024));
        assert_eq!(parse_memory("1048576"), Some(1_048_576));
        assert_eq!(parse_memory("100b"), Some(100));
    }

    #[test]
    fn parse_memory_invalid() {
        assert_eq!(parse_memory("abc"), None);
        assert_eq!(parse_memory("M"), None);
        assert_eq!(parse_memory("-5M"), None);
    }

    #[test]
    fn default_limits_are_500m_and_one_percent_core() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.memory_bytes, 500 * 1024 * 1024);
        assert_eq!(limits.nano_cpus, 10_000_000);
        assert_eq!(limits.cpus_decimal(), "0.01");
    }

    #[test]
    fn cpus_decimal_whole_and_fractional() {
        let mut limits = ResourceLimits::default();
        limits.nano_cpus = 2_000_000_000;
        assert_eq!(limits.cpus_decimal(), "2");
        limits.nano_cpus = 1_500_000_000;
        assert_eq!(limits.cpus_decimal(), "1.5");
    }

    #[test]
    fn limits_below_engine_minimum_are_rejected() {
        let err = ResourceLimits::parse("1M", 10_000_000).unwrap_err();
        assert!(matches!(err, SandboxError::ResourceLimitInvalid { .. }));
    }

    #[test]
    fn zero_cpu_quota_is_rejected() {
        let err = ResourceLimits::parse("500M", 0).unwrap_err();
        assert!(matches!(err, SandboxError::ResourceLimitInvalid { .. }));
    }

    #[test]
    fn unparseable_memory_is_rejected() {
        let err = ResourceLimits::parse("lots", 10_000_000).unwrap_err();
        assert!(matches!(err, SandboxError::ResourceLimitInvalid { .. }));
    }

    #[test]
    fn engine_state_strings_parse() {
        assert_eq!("running".parse::<ContainerState>().unwrap(), ContainerState::Running);
        assert_eq!("exited".parse::<ContainerState>().unwrap(), ContainerState::Stopped);
        assert_eq!("created".parse::<ContainerState>().unwrap(), ContainerState::Created);
        assert!("bogus".parse::<ContainerState>().is_err());
    }

    #[test]
    fn state_display_is_lowercase() {
        assert_eq!(ContainerState::Stopped.to_string(), "stopped");
        assert!(ContainerState::Running.is_running());
        assert!(!ContainerState::Paused.is_running());
    }
}
