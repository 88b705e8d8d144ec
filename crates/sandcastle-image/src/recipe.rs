//! Build-definition files ("recipes") for each variant.
//!
//! A recipe's content and its image tag travel together: every build gets a
//! fresh tag, and the recipe digest is recorded on the resulting image so
//! callers can tell images built from different recipe revisions apart.
//!
//! The shipped recipes are also compiled into the crate, so an installed
//! binary can write them out when the source tree is no longer around.

use std::path::{Path, PathBuf};

use sandcastle_common::error::{Result, SandboxError};
use sha2::{Digest, Sha256};

use crate::variant::ImageVariant;

/// Directory of the build definitions shipped with this crate.
pub const BUNDLED_RECIPE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/dockerfiles");

const EXTRACTED_RECIPE_DIR: &str = concat!("sandcastle-recipes-", env!("CARGO_PKG_VERSION"));

/// The shipped build definition for `variant`, as compiled in.
#[must_use]
pub const fn embedded_recipe(variant: ImageVariant) -> &'static str {
    match variant {
        ImageVariant::Python => include_str!("../dockerfiles/python.dockerfile"),
        ImageVariant::Ubuntu => include_str!("../dockerfiles/ubuntu.dockerfile"),
    }
}

/// Directory of build-definition files, one per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeStore {
    dir: PathBuf,
}

impl RecipeStore {
    /// Opens a recipe directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The build definitions shipped with the crate.
    ///
    /// Uses the source checkout when it still exists; otherwise the compiled-in
    /// copies are written to a versioned directory under the system temp dir.
    #[must_use]
    pub fn bundled() -> Self {
        Self::bundled_from(
            Path::new(BUNDLED_RECIPE_DIR),
            &std::env::temp_dir().join(EXTRACTED_RECIPE_DIR),
        )
    }

    fn bundled_from(source: &Path, fallback: &Path) -> Self {
        if source.is_dir() {
            return Self::new(source);
        }
        match Self::extract(fallback) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(error = %e, dir = %fallback.display(), "could not write bundled recipes");
                Self::new(source)
            }
        }
    }

    /// Writes the compiled-in build definitions into `dir` and opens it.
    ///
    /// Files that already hold the right content are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Io` if the directory or a file cannot be written.
    pub fn extract(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        std::fs::create_dir_all(&store.dir).map_err(|e| SandboxError::Io {
            path: store.dir.clone(),
            source: e,
        })?;
        for variant in ImageVariant::ALL {
            let path = store.path_for(variant);
            let content = embedded_recipe(variant);
            if std::fs::read_to_string(&path).is_ok_and(|current| current == content) {
                continue;
            }
            std::fs::write(&path, content).map_err(|e| SandboxError::Io {
                path: path.clone(),
                source: e,
            })?;
            tracing::debug!(path = %path.display(), "wrote bundled recipe");
        }
        Ok(store)
    }

    /// Recipe directory, also the default build context.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the variant's build definition is expected at.
    #[must_use]
    pub fn path_for(&self, variant: ImageVariant) -> PathBuf {
        self.dir.join(variant.build_definition_path())
    }

    /// Returns the variant's build definition path, checking it exists.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Io` if the file is missing or unreadable.
    pub fn resolve(&self, variant: ImageVariant) -> Result<PathBuf> {
        let path = self.path_for(variant);
        let meta = std::fs::metadata(&path).map_err(|e| SandboxError::Io {
            path: path.clone(),
            source: e,
        })?;
        if !meta.is_file() {
            return Err(SandboxError::Io {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "build definition is not a regular file",
                ),
            });
        }
        Ok(path)
    }

    /// SHA-256 of the variant's build definition, hex encoded.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::Io` if the file cannot be read.
    pub fn digest(&self, variant: ImageVariant) -> Result<String> {
        let path = self.resolve(variant)?;
        let content = std::fs::read(&path).map_err(|e| SandboxError::Io {
            path: path.clone(),
            source: e,
        })?;
        let digest = hex::encode(Sha256::digest(&content));
        tracing::debug!(path = %path.display(), %digest, "hashed build definition");
        Ok(digest)
    }
}

impl Default for RecipeStore {
    fn default() -> Self {
        Self::bundled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_store_has_every_variant() {
        let store = RecipeStore::bundled();
        for variant in ImageVariant::ALL {
            let path = store.resolve(variant).expect("bundled recipe present");
            assert!(path.ends_with(variant.build_definition_path()));
        }
    }

    #[test]
    fn missing_recipe_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecipeStore::new(dir.path());
        let err = store.resolve(ImageVariant::Python).unwrap_err();
        assert!(matches!(err, SandboxError::Io { .. }));
    }

    #[test]
    fn directory_in_place_of_recipe_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("ubuntu.dockerfile")).expect("mkdir");
        let store = RecipeStore::new(dir.path());
        assert!(store.resolve(ImageVariant::Ubuntu).is_err());
    }

    #[test]
    fn digest_changes_with_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecipeStore::new(dir.path());
        let path = store.path_for(ImageVariant::Ubuntu);

        std::fs::write(&path, "FROM ubuntu:22.04\n").expect("write");
        let first = store.digest(ImageVariant::Ubuntu).expect("digest");
        std::fs::write(&path, "FROM ubuntu:24.04\n").expect("write");
        let second = store.digest(ImageVariant::Ubuntu).expect("digest");

        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
    }

    #[test]
    fn compiled_in_recipes_match_shipped_files() {
        let store = RecipeStore::new(BUNDLED_RECIPE_DIR);
        for variant in ImageVariant::ALL {
            let on_disk = std::fs::read_to_string(store.path_for(variant)).expect("read");
            assert_eq!(embedded_recipe(variant), on_disk);
        }
    }

    #[test]
    fn missing_source_tree_falls_back_to_extracted_recipes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fallback = dir.path().join("recipes");

        let store = RecipeStore::bundled_from(&dir.path().join("gone"), &fallback);

        assert_eq!(store.dir(), fallback.as_path());
        let shipped = RecipeStore::new(BUNDLED_RECIPE_DIR);
        for variant in ImageVariant::ALL {
            let _ = store.resolve(variant).expect("extracted recipe present");
            assert_eq!(
                store.digest(variant).expect("digest"),
                shipped.digest(variant).expect("digest")
            );
        }
    }

    #[test]
    fn extract_replaces_stale_recipe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stale = dir.path().join(ImageVariant::Ubuntu.build_definition_path());
        std::fs::write(&stale, "FROM scratch\n").expect("write");

        let store = RecipeStore::extract(dir.path()).expect("extract");

        let content = std::fs::read_to_string(store.path_for(ImageVariant::Ubuntu)).expect("read");
        assert_eq!(content, embedded_recipe(ImageVariant::Ubuntu));
    }
}
