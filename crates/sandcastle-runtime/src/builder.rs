//! Image builds against the variant registry.

use std::path::Path;
use std::sync::Arc;

use sandcastle_common::error::{Result, SandboxError};
use sandcastle_common::id::generate_id;
use sandcastle_common::types::ImageTag;
use sandcastle_image::image::image_tag;
use sandcastle_image::{Image, ImageVariant, RecipeStore};

use crate::backend::{BuildRequest, EngineBackend};

/// Builds tagged images from the variants' build definitions.
pub struct ImageBuilder {
    backend: Arc<dyn EngineBackend>,
    recipes: RecipeStore,
}

impl ImageBuilder {
    /// Creates a builder over the given engine and recipe directory.
    #[must_use]
    pub fn new(backend: Arc<dyn EngineBackend>, recipes: RecipeStore) -> Self {
        Self { backend, recipes }
    }

    /// Recipe directory builds read from.
    #[must_use]
    pub const fn recipes(&self) -> &RecipeStore {
        &self.recipes
    }

    /// Builds `variant` against `context`, tagging the result
    /// `di-<build-definition-name>-<random hex of suffix_len>`.
    ///
    /// Blocks until the engine finishes. A failed build is not retried; build
    /// again to get a fresh tag.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Io` if the build definition or context is
    /// missing, `SandboxError::BuildFailed` with the partial trace if the
    /// engine build fails, or `SandboxError::EngineUnavailable`.
    pub fn build(&self, variant: ImageVariant, context: &Path, suffix_len: usize) -> Result<Image> {
        let definition = self.recipes.resolve(variant)?;
        if !context.is_dir() {
            return Err(SandboxError::Io {
                path: context.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "build context is not a directory",
                ),
            });
        }
        let recipe_digest = self.recipes.digest(variant)?;
        let tag = image_tag(variant, &generate_id(suffix_len)?);

        tracing::info!(%variant, %tag, backend = self.backend.name(), "building sandbox image");
        let outcome = self.backend.build_image(&BuildRequest {
            definition,
            context: context.to_path_buf(),
            tag: tag.clone(),
        })?;
        tracing::info!(%tag, events = outcome.events.len(), "sandbox image built");

        Ok(Image::new(
            variant,
            tag,
            outcome.image_id,
            recipe_digest,
            outcome.events,
        ))
    }

    /// Removes a built image from the engine.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ImageNotFound` if the engine no longer has it.
    pub fn delete(&self, image: Image) -> Result<()> {
        self.delete_tag(image.tag())
    }

    /// Removes an image by tag.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::ImageNotFound` if the engine has no such tag.
    pub fn delete_tag(&self, tag: &ImageTag) -> Result<()> {
        self.backend.remove_image(tag)?;
        tracing::info!(%tag, "sandbox image deleted");
        Ok(())
    }
}

impl std::fmt::Debug for ImageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuilder")
            .field("backend", &self.backend.name())
            .field("recipes", &self.recipes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn builder() -> (Arc<MemoryBackend>, ImageBuilder) {
        let backend = Arc::new(MemoryBackend::new());
        let builder = ImageBuilder::new(backend.clone(), RecipeStore::bundled());
        (backend, builder)
    }

    #[test]
    fn python_tag_has_definition_name_and_hex_suffix() {
        let (_, builder) = builder();
        let context = builder.recipes().dir().to_path_buf();
        let image = builder.build(ImageVariant::Python, &context, 16).expect("build");
        let pattern = Regex::new(r"^di-python\.dockerfile-[0-9a-f]{16}$").expect("regex");
        assert!(pattern.is_match(image.tag().as_str()), "{}", image.tag());
        assert_eq!(image.variant(), ImageVariant::Python);
    }

    #[test]
    fn build_returns_full_trace_and_digest() {
        let (_, builder) = builder();
        let context = builder.recipes().dir().to_path_buf();
        let mut image = builder.build(ImageVariant::Ubuntu, &context, 8).expect("build");
        assert_eq!(image.recipe_digest().len(), 64);
        assert!(image.engine_id().is_some());
        let events: Vec<_> = image.take_build_logs().collect();
        assert!(events.iter().any(|e| e.contains_key("aux")));
        assert!(events.len() > 2);
    }

    #[test]
    fn consecutive_builds_get_fresh_tags() {
        let (_, builder) = builder();
        let context = builder.recipes().dir().to_path_buf();
        let a = builder.build(ImageVariant::Python, &context, 16).expect("build");
        let b = builder.build(ImageVariant::Python, &context, 16).expect("build");
        assert_ne!(a.tag(), b.tag());
    }

    #[test]
    fn failed_build_carries_partial_logs() {
        let (backend, builder) = builder();
        backend.fail_builds("returned a non-zero code: 1");
        let context = builder.recipes().dir().to_path_buf();
        let err = builder.build(ImageVariant::Python, &context, 16).unwrap_err();
        let SandboxError::BuildFailed { logs, message, .. } = err else {
            panic!("expected BuildFailed, got {err:?}");
        };
        assert_eq!(message, "returned a non-zero code: 1");
        assert!(!logs.is_empty());
        assert!(logs.last().is_some_and(|e| e.contains_key("error")));
        assert_eq!(backend.image_count(), 0);
    }

    #[test]
    fn missing_context_fails_before_engine() {
        let (backend, builder) = builder();
        let err = builder
            .build(ImageVariant::Python, Path::new("/nonexistent/context"), 16)
            .unwrap_err();
        assert!(matches!(err, SandboxError::Io { .. }));
        assert_eq!(backend.image_count(), 0);
    }

    #[test]
    fn delete_removes_image_once() {
        let (backend, builder) = builder();
        let context = builder.recipes().dir().to_path_buf();
        let image = builder.build(ImageVariant::Ubuntu, &context, 16).expect("build");
        let tag = image.tag().clone();
        builder.delete(image).expect("delete");
        assert_eq!(backend.image_count(), 0);
        assert!(matches!(
            builder.delete_tag(&tag),
            Err(SandboxError::ImageNotFound { .. })
        ));
    }
}
