//! In-process engine for tests and offline development.
//!
//! Follows the Docker engine's observable semantics closely enough to drive
//! the whole sandbox pipeline: images must be built before they are run,
//! containers move through the engine's states, ids resolve by full id,
//! unique prefix, or name, and removed containers are gone for good. Commands
//! are answered by a pluggable handler instead of a real shell.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sandcastle_common::error::{Result, SandboxError};
use sandcastle_common::id::generate_id;
use sandcastle_common::types::{BuildLogEvent, ContainerId, ContainerState, ImageTag};

use super::{BuildOutcome, BuildRequest, ContainerInfo, ContainerSpec, EngineBackend};

/// Produces the output of a command run inside a container.
pub type ExecHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    image: ImageTag,
    state: ContainerState,
    network_mode: String,
    command: Option<String>,
    logs: String,
    created_at: String,
}

#[derive(Debug, Default)]
struct Inner {
    images: HashMap<ImageTag, String>,
    containers: HashMap<String, Entry>,
    build_failure: Option<String>,
    failures: HashMap<&'static str, String>,
    unavailable: bool,
    exec_count: usize,
}

/// Engine that keeps all images and containers in memory.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    handler: ExecHandler,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Creates an empty engine whose commands echo themselves back.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            handler: Arc::new(|command| format!("{command}\n")),
        }
    }

    /// Answers every command, start commands included, with `handler`.
    #[must_use]
    pub fn with_exec_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Makes every following build fail after its first step.
    pub fn fail_builds(&self, message: impl Into<String>) {
        self.lock().build_failure = Some(message.into());
    }

    /// Makes every following `operation` (`start`, `stop`, `restart`, or
    /// `remove`) fail with an engine error carrying `message`.
    pub fn fail_operation(&self, operation: &'static str, message: impl Into<String>) {
        let _ = self.lock().failures.insert(operation, message.into());
    }

    /// Puts a container into `state` directly, as the engine does on its own
    /// for crashes, OOM kills, and pauses.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` if `id` does not resolve.
    pub fn force_state(&self, id: &ContainerId, state: ContainerState) -> Result<()> {
        self.lock().entry_mut(id)?.state = state;
        Ok(())
    }

    /// Simulates the control socket going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    /// Number of commands executed so far.
    #[must_use]
    pub fn exec_count(&self) -> usize {
        self.lock().exec_count
    }

    /// Number of images currently stored.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.lock().images.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the engine, failing if it is marked unavailable.
    fn connect(&self) -> Result<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if inner.unavailable {
            return Err(SandboxError::EngineUnavailable {
                message: "memory engine is offline".into(),
            });
        }
        Ok(inner)
    }

    /// Like [`connect`](Self::connect), then applies any failure injected
    /// for `operation`.
    fn connect_for(&self, operation: &'static str) -> Result<MutexGuard<'_, Inner>> {
        let inner = self.connect()?;
        if let Some(message) = inner.failures.get(operation) {
            return Err(SandboxError::Engine {
                operation,
                message: message.clone(),
            });
        }
        Ok(inner)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Resolves a full id, a unique id prefix, or a name.
    fn resolve(&self, id: &ContainerId) -> Result<String> {
        let wanted = id.as_str();
        if self.containers.contains_key(wanted) {
            return Ok(wanted.to_owned());
        }
        if let Some((key, _)) = self.containers.iter().find(|(_, e)| e.name == wanted) {
            return Ok(key.clone());
        }
        let mut prefixed = self.containers.keys().filter(|k| k.starts_with(wanted));
        match (prefixed.next(), prefixed.next()) {
            (Some(key), None) if !wanted.is_empty() => Ok(key.clone()),
            _ => Err(SandboxError::not_found(wanted)),
        }
    }

    fn entry_mut(&mut self, id: &ContainerId) -> Result<&mut Entry> {
        let key = self.resolve(id)?;
        self.containers
            .get_mut(&key)
            .ok_or_else(|| SandboxError::not_found(id))
    }
}

impl EngineBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        !self.lock().unavailable
    }

    fn build_image(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        let mut inner = self.connect()?;
        let recipe = std::fs::read_to_string(&request.definition).map_err(|e| SandboxError::Io {
            path: request.definition.clone(),
            source: e,
        })?;
        let steps: Vec<&str> = recipe
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        let mut events = Vec::with_capacity(steps.len() + 2);
        for (i, step) in steps.iter().enumerate() {
            events.push(stream(&format!("Step {}/{} : {step}\n", i + 1, steps.len())));
            if let Some(message) = &inner.build_failure {
                let mut error = BuildLogEvent::new();
                let _ = error.insert("error".into(), message.clone().into());
                events.push(error);
                return Err(SandboxError::BuildFailed {
                    tag: request.tag.to_string(),
                    message: message.clone(),
                    logs: events,
                });
            }
        }

        let image_id = format!("sha256:{}", generate_id(64)?);
        let mut aux = BuildLogEvent::new();
        let _ = aux.insert("aux".into(), serde_json::json!({ "ID": image_id }));
        events.push(aux);
        events.push(stream(&format!("Successfully tagged {}\n", request.tag)));
        let _ = inner.images.insert(request.tag.clone(), image_id.clone());
        tracing::debug!(tag = %request.tag, "memory engine built image");

        Ok(BuildOutcome {
            image_id: Some(image_id),
            events,
        })
    }

    fn remove_image(&self, tag: &ImageTag) -> Result<()> {
        let mut inner = self.connect()?;
        inner
            .images
            .remove(tag)
            .map(|_| ())
            .ok_or_else(|| SandboxError::ImageNotFound {
                tag: tag.to_string(),
            })
    }

    fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let mut inner = self.connect()?;
        if !inner.images.contains_key(&spec.image) {
            return Err(SandboxError::ImageNotFound {
                tag: spec.image.to_string(),
            });
        }
        spec.limits.validate()?;
        if inner.containers.values().any(|e| e.name == spec.name) {
            return Err(SandboxError::Engine {
                operation: "run",
                message: format!("Conflict. The container name \"/{}\" is already in use", spec.name),
            });
        }

        let id = ContainerId::new(generate_id(64)?);
        let _ = inner.containers.insert(
            id.to_string(),
            Entry {
                name: spec.name.clone(),
                image: spec.image.clone(),
                state: ContainerState::Running,
                network_mode: spec.network_mode.to_owned(),
                command: spec.command.clone(),
                logs: String::new(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        drop(inner);

        if let Some(command) = &spec.command {
            let output = (self.handler)(command);
            self.connect()?.entry_mut(&id)?.logs.push_str(&output);
        }
        Ok(id)
    }

    fn inspect(&self, id: &ContainerId) -> Result<ContainerInfo> {
        let mut inner = self.connect()?;
        let key = inner.resolve(id)?;
        let entry = inner.entry_mut(id)?;
        Ok(ContainerInfo {
            id: ContainerId::new(key),
            name: entry.name.clone(),
            image: entry.image.to_string(),
            state: entry.state,
            network_mode: entry.network_mode.clone(),
            created_at: entry.created_at.clone(),
        })
    }

    fn start(&self, id: &ContainerId) -> Result<()> {
        let command = {
            let mut inner = self.connect_for("start")?;
            let entry = inner.entry_mut(id)?;
            if entry.state.is_running() {
                return Ok(());
            }
            entry.state = ContainerState::Running;
            entry.command.clone()
        };
        if let Some(command) = command {
            let output = (self.handler)(&command);
            self.connect()?.entry_mut(id)?.logs.push_str(&output);
        }
        Ok(())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        let mut inner = self.connect_for("stop")?;
        inner.entry_mut(id)?.state = ContainerState::Stopped;
        Ok(())
    }

    fn restart(&self, id: &ContainerId) -> Result<()> {
        drop(self.connect_for("restart")?);
        self.stop(id)?;
        self.start(id)
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut inner = self.connect_for("remove")?;
        let key = inner.resolve(id)?;
        let _ = inner.containers.remove(&key);
        Ok(())
    }

    fn exec(&self, id: &ContainerId, command: &str) -> Result<String> {
        {
            let mut inner = self.connect()?;
            let state = inner.entry_mut(id)?.state;
            if !state.is_running() {
                return Err(SandboxError::ContainerNotRunning {
                    id: id.clone(),
                    state,
                });
            }
            inner.exec_count += 1;
        }
        // The lock is released so a stop can interrupt a long command.
        Ok((self.handler)(command))
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        let mut inner = self.connect()?;
        Ok(inner.entry_mut(id)?.logs.clone())
    }
}

fn stream(line: &str) -> BuildLogEvent {
    let mut event = BuildLogEvent::new();
    let _ = event.insert("stream".into(), line.into());
    event
}

#[cfg(test)]
mod tests {
    use sandcastle_common::types::ResourceLimits;

    use super::*;

    fn build(backend: &MemoryBackend, tag: &str) -> BuildOutcome {
        let recipes = sandcastle_image::RecipeStore::bundled();
        backend
            .build_image(&BuildRequest {
                definition: recipes.path_for(sandcastle_image::ImageVariant::Python),
                context: recipes.dir().to_path_buf(),
                tag: ImageTag::new(tag),
            })
            .expect("build")
    }

    fn spec(name: &str, tag: &str, command: &str) -> ContainerSpec {
        ContainerSpec::sandbox(name.into(), ImageTag::new(tag), command, ResourceLimits::default())
    }

    #[test]
    fn build_records_steps_and_image_id() {
        let backend = MemoryBackend::new();
        let outcome = build(&backend, "di-test-1");
        assert!(outcome.image_id.as_deref().is_some_and(|id| id.starts_with("sha256:")));
        assert!(outcome.events[0]["stream"].as_str().unwrap().starts_with("Step 1/"));
        assert_eq!(backend.image_count(), 1);
    }

    #[test]
    fn run_requires_built_image() {
        let backend = MemoryBackend::new();
        let err = backend.run_container(&spec("sandbox-a", "di-missing", "")).unwrap_err();
        assert!(matches!(err, SandboxError::ImageNotFound { .. }));
    }

    #[test]
    fn duplicate_names_conflict() {
        let backend = MemoryBackend::new();
        let _ = build(&backend, "di-test-2");
        let _ = backend.run_container(&spec("sandbox-b", "di-test-2", "")).expect("run");
        let err = backend.run_container(&spec("sandbox-b", "di-test-2", "")).unwrap_err();
        assert!(matches!(err, SandboxError::Engine { operation: "run", .. }));
    }

    #[test]
    fn containers_resolve_by_name_and_prefix() {
        let backend = MemoryBackend::new();
        let _ = build(&backend, "di-test-3");
        let id = backend.run_container(&spec("sandbox-c", "di-test-3", "")).expect("run");

        let by_name = backend.inspect(&ContainerId::new("sandbox-c")).expect("by name");
        let by_prefix = backend.inspect(&ContainerId::new(&id.as_str()[..12])).expect("by prefix");
        assert_eq!(by_name.id, id);
        assert_eq!(by_prefix.id, id);
    }

    #[test]
    fn offline_engine_is_unavailable() {
        let backend = MemoryBackend::new();
        backend.set_available(false);
        assert!(!backend.is_available());
        let err = backend.inspect(&ContainerId::new("x")).unwrap_err();
        assert!(matches!(err, SandboxError::EngineUnavailable { .. }));
    }

    #[test]
    fn injected_failures_hit_only_their_operation() {
        let backend = MemoryBackend::new();
        let _ = build(&backend, "di-test-5");
        let id = backend.run_container(&spec("sandbox-e", "di-test-5", "")).expect("run");
        backend.fail_operation("stop", "device or resource busy");

        let err = backend.stop(&id).unwrap_err();
        assert!(matches!(err, SandboxError::Engine { operation: "stop", .. }));
        backend.remove(&id).expect("remove still works");
    }

    #[test]
    fn forced_state_is_reported_by_inspect() {
        let backend = MemoryBackend::new();
        let _ = build(&backend, "di-test-6");
        let id = backend.run_container(&spec("sandbox-f", "di-test-6", "")).expect("run");
        backend.force_state(&id, ContainerState::Dead).expect("force");
        assert_eq!(backend.inspect(&id).expect("inspect").state, ContainerState::Dead);
    }

    #[test]
    fn start_command_output_lands_in_logs_on_every_start() {
        let backend = MemoryBackend::new().with_exec_handler(|cmd| format!("ran {cmd}\n"));
        let _ = build(&backend, "di-test-4");
        let id = backend.run_container(&spec("sandbox-d", "di-test-4", "boot")).expect("run");
        backend.stop(&id).expect("stop");
        backend.start(&id).expect("start");
        assert_eq!(backend.logs(&id).expect("logs"), "ran boot\nran boot\n");
    }
}
