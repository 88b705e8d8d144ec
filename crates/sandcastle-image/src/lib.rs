//! # sandcastle-image
//!
//! Image-side building blocks for sandboxes.
//!
//! Handles:
//! - **Variants**: The closed set of sandbox kinds and their code-formatting rules.
//! - **Recipes**: Resolution and fingerprinting of build-definition files.
//! - **Images**: Immutable handles to built images with their build logs.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod image;
pub mod recipe;
pub mod variant;

pub use image::{BuildLogs, Image};
pub use recipe::RecipeStore;
pub use variant::ImageVariant;
