//! Global configuration model for the Sandcastle core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, SandboxError};
use crate::types::{ResourceLimits, parse_memory};

/// How to reach the container engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine CLI binary name or path.
    pub binary: String,
    /// Control socket URI (e.g. `unix:///var/run/docker.sock`); the engine's
    /// own default when unset.
    pub host: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: constants::DEFAULT_ENGINE_BINARY.into(),
            host: None,
        }
    }
}

/// Root configuration for the sandbox core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Engine connection settings.
    pub engine: EngineConfig,
    /// Directory holding build-definition files; the bundled set when unset.
    pub recipe_dir: Option<PathBuf>,
    /// Build context directory; the recipe directory when unset.
    pub build_context: Option<PathBuf>,
    /// Random suffix length for image tags.
    pub tag_suffix_len: usize,
    /// Random suffix length for container names.
    pub container_name_len: usize,
    /// Limits applied when the caller does not supply any.
    pub default_limits: ResourceLimits,
    /// Deadline for a single execution in seconds; `None` blocks indefinitely.
    pub exec_timeout_secs: Option<u64>,
    /// Grace period for `stop` before the engine kills the container.
    pub stop_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            recipe_dir: None,
            build_context: None,
            tag_suffix_len: constants::DEFAULT_TAG_SUFFIX_LEN,
            container_name_len: constants::DEFAULT_CONTAINER_NAME_LEN,
            default_limits: ResourceLimits::default(),
            exec_timeout_secs: Some(constants::DEFAULT_EXEC_TIMEOUT_SECS),
            stop_timeout_secs: constants::DEFAULT_STOP_TIMEOUT_SECS,
        }
    }
}

impl SandboxConfig {
    /// Loads a JSON configuration file; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| SandboxError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparseable value.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlays values from `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparseable value.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(binary) = lookup(constants::ENV_ENGINE_BINARY) {
            self.engine.binary = binary;
        }
        if let Some(host) = lookup(constants::ENV_ENGINE_HOST).filter(|h| !h.is_empty()) {
            self.engine.host = Some(host);
        }
        if let Some(dir) = lookup(constants::ENV_RECIPE_DIR) {
            self.recipe_dir = Some(PathBuf::from(dir));
        }
        if let Some(memory) = lookup(constants::ENV_MEMORY_LIMIT) {
            self.default_limits.memory_bytes =
                parse_memory(&memory).ok_or_else(|| SandboxError::Config {
                    message: format!("{}: unparseable memory {memory:?}", constants::ENV_MEMORY_LIMIT),
                })?;
        }
        if let Some(cpus) = lookup(constants::ENV_NANO_CPUS) {
            self.default_limits.nano_cpus = parse_u64(constants::ENV_NANO_CPUS, &cpus)?;
        }
        if let Some(timeout) = lookup(constants::ENV_EXEC_TIMEOUT) {
            let secs = parse_u64(constants::ENV_EXEC_TIMEOUT, &timeout)?;
            self.exec_timeout_secs = (secs > 0).then_some(secs);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error for zero-length identifiers or invalid default limits.
    pub fn validate(&self) -> Result<()> {
        if self.tag_suffix_len == 0 || self.container_name_len == 0 {
            return Err(SandboxError::Config {
                message: "identifier suffix lengths must be positive".into(),
            });
        }
        if self.engine.binary.trim().is_empty() {
            return Err(SandboxError::Config {
                message: "engine binary must not be empty".into(),
            });
        }
        self.default_limits.validate()
    }

    /// Execution deadline, if one is configured.
    #[must_use]
    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_u64(var: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| SandboxError::Config {
        message: format!("{var}: expected an unsigned integer, got {value:?}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_engine_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.engine.binary, "docker");
        assert_eq!(config.tag_suffix_len, 16);
        assert_eq!(config.exec_timeout(), Some(Duration::from_secs(30)));
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn env_overrides_limits_and_engine() {
        let config = SandboxConfig::default()
            .apply_env_with(env(&[
                ("SANDCASTLE_DOCKER_BIN", "podman"),
                ("DOCKER_HOST", "unix:///run/user/1000/podman.sock"),
                ("SANDCASTLE_MEMORY", "1g"),
                ("SANDCASTLE_NANO_CPUS", "500000000"),
            ]))
            .expect("apply env");
        assert_eq!(config.engine.binary, "podman");
        assert_eq!(
            config.engine.host.as_deref(),
            Some("unix:///run/user/1000/podman.sock")
        );
        assert_eq!(config.default_limits.memory_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.default_limits.nano_cpus, 500_000_000);
    }

    #[test]
    fn zero_exec_timeout_disables_deadline() {
        let config = SandboxConfig::default()
            .apply_env_with(env(&[("SANDCASTLE_EXEC_TIMEOUT", "0")]))
            .expect("apply env");
        assert_eq!(config.exec_timeout(), None);
    }

    #[test]
    fn bad_env_value_is_config_error() {
        let err = SandboxConfig::default()
            .apply_env_with(env(&[("SANDCASTLE_NANO_CPUS", "fast")]))
            .unwrap_err();
        assert!(matches!(err, SandboxError::Config { .. }));
    }

    #[test]
    fn load_partial_json_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sandcastle.json");
        std::fs::write(&path, r#"{ "tag_suffix_len": 8, "engine": { "host": "tcp://127.0.0.1:2375" } }"#)
            .expect("write");
        let config = SandboxConfig::load(&path).expect("load");
        assert_eq!(config.tag_suffix_len, 8);
        assert_eq!(config.engine.binary, "docker");
        assert_eq!(config.engine.host.as_deref(), Some("tcp://127.0.0.1:2375"));
        assert_eq!(config.container_name_len, 16);
    }

    #[test]
    fn load_rejects_zero_suffix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "container_name_len": 0 }"#).expect("write");
        assert!(SandboxConfig::load(&path).is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = SandboxConfig::load(Path::new("/nonexistent/sandcastle.json")).unwrap_err();
        assert!(matches!(err, SandboxError::Io { .. }));
    }
}
