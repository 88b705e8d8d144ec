//! Unified error types for the Sandcastle workspace.
//!
//! Every engine-facing operation surfaces one of these variants to the caller.
//! Nothing here is retried internally; retry policy belongs to the caller.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{BuildLogEvent, ContainerId, ContainerState};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The engine reported a non-zero build outcome.
    #[error("build of {tag} failed: {message}")]
    BuildFailed {
        /// Tag the image would have received.
        tag: String,
        /// Failure reported by the engine.
        message: String,
        /// Log events produced before the failure, verbatim.
        logs: Vec<BuildLogEvent>,
    },

    /// The container engine control plane could not be reached.
    #[error("container engine unavailable: {message}")]
    EngineUnavailable {
        /// Description of the connection failure.
        message: String,
    },

    /// Resource limit values are not representable by the engine.
    #[error("invalid resource limit: {message}")]
    ResourceLimitInvalid {
        /// Description of the rejected limit.
        message: String,
    },

    /// Lookup or operation on an absent or removed container.
    #[error("container not found: {id}")]
    ContainerNotFound {
        /// Identifier that did not resolve.
        id: String,
    },

    /// Execution attempted on a container that is not running.
    #[error("container {id} is not running (state: {state})")]
    ContainerNotRunning {
        /// Target container.
        id: ContainerId,
        /// State reported by the engine.
        state: ContainerState,
    },

    /// The engine could not attach to or execute in the container.
    #[error("exec in container {id} failed: {message}")]
    ExecutionEngineError {
        /// Target container.
        id: ContainerId,
        /// Failure reported by the engine.
        message: String,
    },

    /// A command exceeded its execution deadline and was terminated.
    #[error("exec in container {id} timed out after {}s", timeout.as_secs_f64())]
    ExecutionTimedOut {
        /// Container that was stopped to terminate the command.
        id: ContainerId,
        /// Deadline that expired.
        timeout: Duration,
    },

    /// The container's variant has no code-formatting rule.
    #[error("variant {variant} does not support direct code execution")]
    CodeExecutionUnsupported {
        /// Variant name, or `untyped` for a variant-less container.
        variant: String,
    },

    /// A lifecycle transition the engine state does not allow.
    #[error("cannot {operation} container {id} in state {state}")]
    InvalidState {
        /// Target container.
        id: ContainerId,
        /// Requested lifecycle operation.
        operation: &'static str,
        /// State reported by the engine.
        state: ContainerState,
    },

    /// No image with the given tag exists at the engine.
    #[error("image not found: {tag}")]
    ImageNotFound {
        /// Tag that did not resolve.
        tag: String,
    },

    /// Any other failure reported by the engine.
    #[error("engine {operation} failed: {message}")]
    Engine {
        /// Engine operation that failed.
        operation: &'static str,
        /// Failure reported by the engine.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The operating system's secure random source is unavailable.
    #[error("secure random source unavailable: {message}")]
    Entropy {
        /// Error reported by the random source.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl SandboxError {
    /// Shorthand for [`SandboxError::ContainerNotFound`].
    pub fn not_found(id: impl ToString) -> Self {
        Self::ContainerNotFound { id: id.to_string() }
    }

    /// Returns whether the error means the container no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_message_reports_seconds() {
        let err = SandboxError::ExecutionTimedOut {
            id: ContainerId::new("abc"),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "exec in container abc timed out after 1.5s");
    }

    #[test]
    fn not_found_helper_builds_variant() {
        let err = SandboxError::not_found("deadbeef");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "container not found: deadbeef");
    }

    #[test]
    fn build_failed_keeps_partial_logs() {
        let mut event = BuildLogEvent::new();
        let _ = event.insert("stream".into(), "Step 1/2 : FROM python\n".into());
        let err = SandboxError::BuildFailed {
            tag: "di-python.dockerfile-00".into(),
            message: "exit 1".into(),
            logs: vec![event],
        };
        let SandboxError::BuildFailed { logs, .. } = err else {
            unreachable!()
        };
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["stream"], "Step 1/2 : FROM python\n");
    }
}
