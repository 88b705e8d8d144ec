//! Sandbox container manager: the entry point callers hold.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sandcastle_common::config::SandboxConfig;
use sandcastle_common::constants::CONTAINER_NAME_PREFIX;
use sandcastle_common::error::Result;
use sandcastle_common::id::generate_id;
use sandcastle_common::types::{ContainerId, ImageTag, ResourceLimits};
use sandcastle_image::{Image, ImageVariant, RecipeStore};

use crate::backend::{self, ContainerSpec, EngineBackend};
use crate::builder::ImageBuilder;
use crate::container::Container;

/// Builds sandbox images and instantiates, looks up, and deletes sandboxes.
///
/// Holds no per-sandbox state: each [`Image`] and [`Container`] it returns is
/// an independent handle, and mapping them to business objects is up to the
/// caller.
pub struct SandboxManager {
    backend: Arc<dyn EngineBackend>,
    builder: ImageBuilder,
    config: SandboxConfig,
}

impl SandboxManager {
    /// Creates a manager over an explicit engine.
    #[must_use]
    pub fn new(backend: Arc<dyn EngineBackend>, config: SandboxConfig) -> Self {
        let recipes = config
            .recipe_dir
            .as_ref()
            .map_or_else(RecipeStore::bundled, RecipeStore::new);
        Self {
            builder: ImageBuilder::new(Arc::clone(&backend), recipes),
            backend,
            config,
        }
    }

    /// Creates a manager over the Docker CLI backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Config` if the configuration is invalid.
    pub fn from_config(config: SandboxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(backend::from_config(&config), config))
    }

    /// The engine this manager drives.
    #[must_use]
    pub const fn backend(&self) -> &Arc<dyn EngineBackend> {
        &self.backend
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// The image builder in use.
    #[must_use]
    pub const fn builder(&self) -> &ImageBuilder {
        &self.builder
    }

    /// Build context used when the caller does not pass one.
    #[must_use]
    pub fn default_context(&self) -> PathBuf {
        self.config
            .build_context
            .clone()
            .unwrap_or_else(|| self.builder.recipes().dir().to_path_buf())
    }

    /// Builds `variant` with the configured context and tag suffix length.
    ///
    /// # Errors
    ///
    /// See [`ImageBuilder::build`].
    pub fn build(&self, variant: ImageVariant) -> Result<Image> {
        self.builder
            .build(variant, &self.default_context(), self.config.tag_suffix_len)
    }

    /// Builds `variant` against an explicit context and suffix length.
    ///
    /// # Errors
    ///
    /// See [`ImageBuilder::build`].
    pub fn build_with(&self, variant: ImageVariant, context: &Path, suffix_len: usize) -> Result<Image> {
        self.builder.build(variant, context, suffix_len)
    }

    /// Deletes an image from the engine.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ImageNotFound` if it is already gone.
    pub fn delete_image(&self, image: Image) -> Result<()> {
        self.builder.delete(image)
    }

    /// Deletes an image by tag.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ImageNotFound` if the tag is unknown.
    pub fn delete_image_tag(&self, tag: &ImageTag) -> Result<()> {
        self.builder.delete_tag(tag)
    }

    /// Creates and starts a sandbox from `image` with an engine-style memory
    /// string (e.g. `"500M"`) and a CPU quota in nano-CPUs.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ResourceLimitInvalid` for unrepresentable limits
    /// or `SandboxError::EngineUnavailable`.
    pub fn run(&self, image: &Image, start_command: &str, memory: &str, nano_cpus: u64) -> Result<Container> {
        let limits = ResourceLimits::parse(memory, nano_cpus)?;
        self.run_with_limits(image, start_command, limits)
    }

    /// Creates and starts a sandbox under the configured default limits.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn run_default(&self, image: &Image, start_command: &str) -> Result<Container> {
        self.run_with_limits(image, start_command, self.config.default_limits)
    }

    /// Creates and starts a sandbox under explicit limits.
    ///
    /// The container is detached, has a TTY and open stdin, and has no
    /// network for its whole lifetime.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn run_with_limits(
        &self,
        image: &Image,
        start_command: &str,
        limits: ResourceLimits,
    ) -> Result<Container> {
        self.run_tag(image.tag(), image.variant(), start_command, limits)
    }

    /// Creates and starts a sandbox from an image known only by tag.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run); an unknown tag yields
    /// `SandboxError::ImageNotFound`.
    pub fn run_tag(
        &self,
        tag: &ImageTag,
        variant: ImageVariant,
        start_command: &str,
        limits: ResourceLimits,
    ) -> Result<Container> {
        limits.validate()?;
        let name = format!(
            "{CONTAINER_NAME_PREFIX}-{}",
            generate_id(self.config.container_name_len)?
        );
        let spec = ContainerSpec::sandbox(name, tag.clone(), start_command, limits);
        let id = self.backend.run_container(&spec)?;
        tracing::info!(
            %id,
            name = %spec.name,
            image = %tag,
            %variant,
            memory_bytes = limits.memory_bytes,
            nano_cpus = limits.nano_cpus,
            "sandbox started"
        );
        Ok(Container::new(
            Arc::clone(&self.backend),
            id,
            spec.name,
            Some(variant),
            self.config.exec_timeout(),
        ))
    }

    /// Looks up an existing container. With a variant the handle carries that
    /// variant's capabilities; without one it has lifecycle operations and
    /// raw commands only.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ContainerNotFound` if `id` does not resolve.
    pub fn get(&self, id: &ContainerId, variant: Option<ImageVariant>) -> Result<Container> {
        let info = self.backend.inspect(id)?;
        tracing::debug!(id = %info.id, name = %info.name, state = %info.state, "container found");
        Ok(Container::new(
            Arc::clone(&self.backend),
            info.id,
            info.name,
            variant,
            self.config.exec_timeout(),
        ))
    }
}

impl std::fmt::Debug for SandboxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxManager")
            .field("backend", &self.backend.name())
            .field("builder", &self.builder)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;
    use sandcastle_common::error::SandboxError;
    use sandcastle_common::types::ContainerState;

    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn manager() -> (Arc<MemoryBackend>, SandboxManager) {
        let backend = Arc::new(MemoryBackend::new());
        let manager = SandboxManager::new(backend.clone(), SandboxConfig::default());
        (backend, manager)
    }

    #[test]
    fn run_names_container_and_disables_network() {
        let (_, manager) = manager();
        let image = manager.build(ImageVariant::Python).expect("build");
        let container = manager.run(&image, "", "500M", 10_000_000).expect("run");

        let pattern = Regex::new(r"^sandbox-[0-9a-f]{16}$").expect("regex");
        assert!(pattern.is_match(container.name()), "{}", container.name());
        let info = container.inspect().expect("inspect");
        assert_eq!(info.state, ContainerState::Running);
        assert_eq!(info.network_mode, "none");
        assert_eq!(container.variant(), Some(ImageVariant::Python));
    }

    #[test]
    fn run_rejects_bad_limits_without_touching_engine() {
        let (_, manager) = manager();
        let image = manager.build(ImageVariant::Ubuntu).expect("build");
        assert!(matches!(
            manager.run(&image, "", "2M", 10_000_000),
            Err(SandboxError::ResourceLimitInvalid { .. })
        ));
        assert!(matches!(
            manager.run(&image, "", "500M", 0),
            Err(SandboxError::ResourceLimitInvalid { .. })
        ));
    }

    #[test]
    fn run_fails_when_engine_is_down() {
        let (backend, manager) = manager();
        let image = manager.build(ImageVariant::Ubuntu).expect("build");
        backend.set_available(false);
        assert!(matches!(
            manager.run_default(&image, ""),
            Err(SandboxError::EngineUnavailable { .. })
        ));
    }

    #[test]
    fn get_with_and_without_variant() {
        let (_, manager) = manager();
        let image = manager.build(ImageVariant::Python).expect("build");
        let original = manager.run_default(&image, "").expect("run");

        let typed = manager
            .get(original.id(), Some(ImageVariant::Python))
            .expect("get typed");
        assert!(typed.supports_code());
        assert_eq!(typed.name(), original.name());

        let untyped = manager.get(original.id(), None).expect("get untyped");
        assert!(!untyped.supports_code());
        assert!(matches!(
            untyped.run_code("print(1)"),
            Err(SandboxError::CodeExecutionUnsupported { .. })
        ));
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let (_, manager) = manager();
        let err = manager.get(&ContainerId::new("ffff"), None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn each_run_gets_a_unique_name() {
        let (_, manager) = manager();
        let image = manager.build(ImageVariant::Ubuntu).expect("build");
        let a = manager.run_default(&image, "").expect("run a");
        let b = manager.run_default(&image, "").expect("run b");
        assert_ne!(a.name(), b.name());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn recipe_dir_from_config_is_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ubuntu.dockerfile"), "FROM ubuntu:24.04\n").expect("write");
        let config = SandboxConfig {
            recipe_dir: Some(dir.path().to_path_buf()),
            ..SandboxConfig::default()
        };
        let manager = SandboxManager::new(Arc::new(MemoryBackend::new()), config);
        assert_eq!(manager.default_context(), dir.path());
        let _ = manager.build(ImageVariant::Ubuntu).expect("ubuntu recipe present");
        assert!(matches!(
            manager.build(ImageVariant::Python),
            Err(SandboxError::Io { .. })
        ));
    }

    #[test]
    fn exec_timeout_comes_from_config() {
        let backend = Arc::new(MemoryBackend::new());
        let config = SandboxConfig {
            exec_timeout_secs: None,
            ..SandboxConfig::default()
        };
        let manager = SandboxManager::new(backend, config);
        let image = manager.build(ImageVariant::Python).expect("build");
        let container = manager.run_default(&image, "").expect("run");
        assert_eq!(container.exec_timeout(), None);
    }
}
