//! Handles to built sandbox images.

use chrono::{DateTime, Utc};
use sandcastle_common::constants::IMAGE_TAG_PREFIX;
use sandcastle_common::types::{BuildLogEvent, ImageTag};

use crate::variant::ImageVariant;

/// Tag for a new build of `variant`: `di-<build-definition-name>-<suffix>`.
#[must_use]
pub fn image_tag(variant: ImageVariant, suffix: &str) -> ImageTag {
    ImageTag::new(format!(
        "{IMAGE_TAG_PREFIX}-{}-{suffix}",
        variant.build_definition_path()
    ))
}

/// The build trace of an image, consumed once.
///
/// Events are yielded in the order the engine produced them.
#[derive(Debug, Default)]
pub struct BuildLogs {
    events: std::vec::IntoIter<BuildLogEvent>,
}

impl BuildLogs {
    /// Wraps the captured events.
    #[must_use]
    pub fn new(events: Vec<BuildLogEvent>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }

    /// Number of events not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    /// Concatenates the `stream` fields of the remaining events.
    #[must_use]
    pub fn into_text(self) -> String {
        self.filter_map(|event| event.get("stream").and_then(|s| s.as_str()).map(str::to_owned))
            .collect()
    }
}

impl Iterator for BuildLogs {
    type Item = BuildLogEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}

impl ExactSizeIterator for BuildLogs {}

/// An immutable build artifact that containers are instantiated from.
#[derive(Debug)]
pub struct Image {
    variant: ImageVariant,
    tag: ImageTag,
    engine_id: Option<String>,
    recipe_digest: String,
    created_at: DateTime<Utc>,
    build_logs: BuildLogs,
}

impl Image {
    /// Creates a handle for a freshly built image.
    #[must_use]
    pub fn new(
        variant: ImageVariant,
        tag: ImageTag,
        engine_id: Option<String>,
        recipe_digest: String,
        build_logs: Vec<BuildLogEvent>,
    ) -> Self {
        Self {
            variant,
            tag,
            engine_id,
            recipe_digest,
            created_at: Utc::now(),
            build_logs: BuildLogs::new(build_logs),
        }
    }

    /// Variant the image was built for.
    #[must_use]
    pub const fn variant(&self) -> ImageVariant {
        self.variant
    }

    /// Unique tag of the image.
    #[must_use]
    pub const fn tag(&self) -> &ImageTag {
        &self.tag
    }

    /// Engine image id, when the engine reported one.
    #[must_use]
    pub fn engine_id(&self) -> Option<&str> {
        self.engine_id.as_deref()
    }

    /// SHA-256 of the build definition the image was built from.
    #[must_use]
    pub fn recipe_digest(&self) -> &str {
        &self.recipe_digest
    }

    /// When the build finished.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Takes the build trace, leaving an exhausted one behind.
    pub fn take_build_logs(&mut self) -> BuildLogs {
        std::mem::take(&mut self.build_logs)
    }
}
