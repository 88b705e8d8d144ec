//! Handle to a sandbox container and its lifecycle operations.

use std::sync::Arc;
use std::time::Duration;

use sandcastle_common::error::{Result, SandboxError};
use sandcastle_common::types::{ContainerId, ContainerState};
use sandcastle_image::ImageVariant;

use crate::backend::{ContainerInfo, EngineBackend};

/// A container created from a sandbox image.
///
/// The variant decides the capability set: every container has the lifecycle
/// operations and [`run_command`](Self::run_command); only variants with a
/// code-formatting rule accept [`run_code`](Self::run_code). State is read
/// from the engine on every call, never cached.
pub struct Container {
    id: ContainerId,
    name: String,
    variant: Option<ImageVariant>,
    backend: Arc<dyn EngineBackend>,
    exec_timeout: Option<Duration>,
    removed: bool,
}

impl Container {
    pub(crate) fn new(
        backend: Arc<dyn EngineBackend>,
        id: ContainerId,
        name: String,
        variant: Option<ImageVariant>,
        exec_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            name,
            variant,
            backend,
            exec_timeout,
            removed: false,
        }
    }

    /// Engine-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Unique container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant the container was typed to, if any.
    #[must_use]
    pub const fn variant(&self) -> Option<ImageVariant> {
        self.variant
    }

    /// Whether [`run_code`](Self::run_code) is available.
    #[must_use]
    pub fn supports_code(&self) -> bool {
        self.variant.is_some_and(ImageVariant::supports_code)
    }

    /// Deadline applied to each execution.
    #[must_use]
    pub const fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout
    }

    /// Replaces the execution deadline; `None` blocks until completion.
    #[must_use]
    pub const fn with_exec_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub(crate) fn backend(&self) -> &Arc<dyn EngineBackend> {
        &self.backend
    }

    pub(crate) fn ensure_present(&self) -> Result<()> {
        if self.removed {
            return Err(SandboxError::not_found(&self.id));
        }
        Ok(())
    }

    /// Current engine view of the container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` once removed.
    pub fn inspect(&self) -> Result<ContainerInfo> {
        self.ensure_present()?;
        self.backend.inspect(&self.id)
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` once removed.
    pub fn state(&self) -> Result<ContainerState> {
        self.inspect().map(|info| info.state)
    }

    /// Starts a stopped container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::InvalidState` if it is already running, or
    /// `SandboxError::ContainerNotFound` once removed.
    pub fn start(&self) -> Result<()> {
        let state = self.state()?;
        if state.is_running() || state == ContainerState::Paused {
            return Err(SandboxError::InvalidState {
                id: self.id.clone(),
                operation: "start",
                state,
            });
        }
        self.backend.start(&self.id)?;
        tracing::info!(id = %self.id, name = %self.name, "container started");
        Ok(())
    }

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotRunning` if it is not running, or
    /// `SandboxError::ContainerNotFound` once removed.
    pub fn stop(&self) -> Result<()> {
        let state = self.state()?;
        if !state.is_running() {
            return Err(SandboxError::ContainerNotRunning {
                id: self.id.clone(),
                state,
            });
        }
        self.backend.stop(&self.id)?;
        tracing::info!(id = %self.id, name = %self.name, "container stopped");
        Ok(())
    }

    /// Restarts a running or stopped container.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::InvalidState` for created, paused, restarting,
    /// or dead containers, or `SandboxError::ContainerNotFound` once removed.
    pub fn restart(&self) -> Result<()> {
        let state = self.state()?;
        if !matches!(state, ContainerState::Running | ContainerState::Stopped) {
            return Err(SandboxError::InvalidState {
                id: self.id.clone(),
                operation: "restart",
                state,
            });
        }
        self.backend.restart(&self.id)?;
        tracing::info!(id = %self.id, name = %self.name, "container restarted");
        Ok(())
    }

    /// Removes the container in any state. Every later call on this handle
    /// fails with `SandboxError::ContainerNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` if it is already gone.
    pub fn remove(&mut self) -> Result<()> {
        self.ensure_present()?;
        self.backend.remove(&self.id)?;
        self.removed = true;
        tracing::info!(id = %self.id, name = %self.name, "container removed");
        Ok(())
    }

    /// Everything the container wrote to stdout and stderr since creation.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` once removed.
    pub fn logs(&self) -> Result<String> {
        self.ensure_present()?;
        self.backend.logs(&self.id)
    }

    /// Runs a shell command and returns its combined output.
    ///
    /// # Errors
    ///
    /// See [`exec::run_command`](crate::exec::run_command).
    pub fn run_command(&self, command: &str) -> Result<String> {
        crate::exec::run_command(self, command)
    }

    /// Runs source code through the variant's interpreter.
    ///
    /// # Errors
    ///
    /// See [`exec::run_code`](crate::exec::run_code).
    pub fn run_code(&self, source: &str) -> Result<String> {
        crate::exec::run_code(self, source)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("variant", &self.variant)
            .field("backend", &self.backend.name())
            .field("exec_timeout", &self.exec_timeout)
            .field("removed", &self.removed)
            .finish()
    }
}
