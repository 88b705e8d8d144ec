//! Container engine abstraction.
//!
//! Every component receives its engine as an `Arc<dyn EngineBackend>`, so the
//! endpoint can be swapped for a remote daemon or the in-memory engine used in
//! tests. Implementations scope any connection to a single call.

pub mod docker;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use sandcastle_common::config::SandboxConfig;
use sandcastle_common::constants::SANDBOX_NETWORK_MODE;
use sandcastle_common::error::Result;
use sandcastle_common::types::{BuildLogEvent, ContainerId, ContainerState, ImageTag, ResourceLimits};

/// Inputs of a single image build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Build-definition file.
    pub definition: PathBuf,
    /// Directory sent to the engine as build context.
    pub context: PathBuf,
    /// Tag applied to the result.
    pub tag: ImageTag,
}

/// Result of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// Engine image id, if the engine reported one.
    pub image_id: Option<String>,
    /// Full build trace, in engine order.
    pub events: Vec<BuildLogEvent>,
}

/// Configuration of a sandbox container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Unique container name.
    pub name: String,
    /// Tag of the image to instantiate.
    pub image: ImageTag,
    /// Shell command run at start; the image default when `None`.
    pub command: Option<String>,
    /// Memory ceiling and CPU quota.
    pub limits: ResourceLimits,
    /// Network mode, fixed for the container's lifetime.
    pub network_mode: &'static str,
    /// Allocate a pseudo-terminal.
    pub tty: bool,
    /// Keep standard input open.
    pub stdin_open: bool,
}

impl ContainerSpec {
    /// A detached, networkless sandbox with a TTY and open stdin.
    ///
    /// An empty `command` keeps the image's default command.
    #[must_use]
    pub fn sandbox(name: String, image: ImageTag, command: &str, limits: ResourceLimits) -> Self {
        let command = command.trim();
        Self {
            name,
            image,
            command: (!command.is_empty()).then(|| command.to_owned()),
            limits,
            network_mode: SANDBOX_NETWORK_MODE,
            tty: true,
            stdin_open: true,
        }
    }
}

/// Engine view of an existing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Engine-assigned identifier.
    pub id: ContainerId,
    /// Container name without the engine's leading slash.
    pub name: String,
    /// Image the container was created from.
    pub image: String,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// Network mode the container was created with.
    pub network_mode: String,
    /// Creation timestamp as reported by the engine.
    pub created_at: String,
}

/// Platform-agnostic container engine.
///
/// State lives at the engine; implementations keep no container cache beyond
/// what the engine itself is.
pub trait EngineBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Returns whether the engine answers on its control endpoint.
    fn is_available(&self) -> bool;

    /// Builds and tags an image, blocking until it finishes.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::BuildFailed` with the partial trace when the
    /// build fails, or `SandboxError::EngineUnavailable`.
    fn build_image(&self, request: &BuildRequest) -> Result<BuildOutcome>;

    /// Deletes a tagged image.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ImageNotFound` if the tag does not exist.
    fn remove_image(&self, tag: &ImageTag) -> Result<()>;

    /// Creates and starts a container in one step.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ResourceLimitInvalid` if the engine rejects the
    /// limits, or `SandboxError::EngineUnavailable`.
    fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Looks up a container by id, id prefix, or name.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` if nothing matches.
    fn inspect(&self, id: &ContainerId) -> Result<ContainerInfo>;

    /// Starts a stopped container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` or an engine error.
    fn start(&self, id: &ContainerId) -> Result<()>;

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` or an engine error.
    fn stop(&self, id: &ContainerId) -> Result<()>;

    /// Restarts a container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` or an engine error.
    fn restart(&self, id: &ContainerId) -> Result<()>;

    /// Removes a container in any state.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` if it is already gone.
    fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Runs `command` through `sh -c` with a TTY and returns combined output.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotRunning` or
    /// `SandboxError::ExecutionEngineError`.
    fn exec(&self, id: &ContainerId, command: &str) -> Result<String>;

    /// Returns everything the container wrote to stdout and stderr, in the
    /// order it was written.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` or an engine error.
    fn logs(&self, id: &ContainerId) -> Result<String>;
}

/// Creates the Docker CLI backend described by `config`.
#[must_use]
pub fn from_config(config: &SandboxConfig) -> Arc<dyn EngineBackend> {
    Arc::new(docker::DockerBackend::from_config(config))
}
