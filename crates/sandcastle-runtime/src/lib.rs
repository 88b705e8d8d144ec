//! Sandbox lifecycle management over an external container engine.
//!
//! The engine is reached through an [`EngineBackend`](backend::EngineBackend)
//! injected into every component: [`ImageBuilder`](builder::ImageBuilder)
//! produces images, [`SandboxManager`](manager::SandboxManager) turns them
//! into running [`Container`](container::Container)s, and the [`exec`] module
//! runs commands and code inside them.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod builder;
pub mod container;
pub mod exec;
pub mod manager;

pub use backend::EngineBackend;
pub use builder::ImageBuilder;
pub use container::Container;
pub use manager::SandboxManager;
