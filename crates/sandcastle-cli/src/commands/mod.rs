//! CLI command definitions and dispatch.

pub mod build;
pub mod code;
pub mod exec;
pub mod inspect;
pub mod lifecycle;
pub mod logs;
pub mod rmi;
pub mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sandcastle_common::config::SandboxConfig;
use sandcastle_common::types::ContainerId;
use sandcastle_image::ImageVariant;
use sandcastle_runtime::{Container, SandboxManager};

/// Sandcastle — isolated, network-less sandboxes for untrusted commands and code.
#[derive(Parser, Debug)]
#[command(name = "sandcastle", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// JSON configuration file; environment variables override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Docker control socket URI (e.g. `unix:///var/run/docker.sock`).
    #[arg(long, global = true)]
    pub docker_host: Option<String>,

    /// Deadline for each command or code execution in seconds; 0 disables it.
    #[arg(long, global = true)]
    pub exec_timeout: Option<u64>,
}

impl GlobalArgs {
    /// Resolves the effective configuration: file, then environment, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn config(&self) -> anyhow::Result<SandboxConfig> {
        let base = match &self.config {
            Some(path) => SandboxConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => SandboxConfig::default(),
        };
        let mut config = base.apply_env()?;
        if let Some(host) = &self.docker_host {
            config.engine.host = Some(host.clone());
        }
        if let Some(secs) = self.exec_timeout {
            config.exec_timeout_secs = (secs > 0).then_some(secs);
        }
        config.validate()?;
        tracing::debug!(?config, "configuration resolved");
        Ok(config)
    }

    /// Builds a manager over the configured engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn manager(&self) -> anyhow::Result<SandboxManager> {
        Ok(SandboxManager::from_config(self.config()?)?)
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a sandbox image from a variant's build definition.
    Build(build::BuildArgs),
    /// Create and start a sandbox container from a built image.
    Run(run::RunArgs),
    /// Run a shell command inside a running sandbox.
    Exec(exec::ExecArgs),
    /// Run source code through the sandbox's interpreter.
    Code(code::CodeArgs),
    /// Print everything a sandbox has written since creation.
    Logs(logs::LogsArgs),
    /// Start a stopped sandbox.
    Start(lifecycle::TargetArgs),
    /// Stop a running sandbox.
    Stop(lifecycle::TargetArgs),
    /// Restart a sandbox.
    Restart(lifecycle::TargetArgs),
    /// Remove a sandbox in any state.
    Rm(lifecycle::TargetArgs),
    /// Show a sandbox's engine state.
    Inspect(inspect::InspectArgs),
    /// Delete a sandbox image.
    Rmi(rmi::RmiArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let manager = cli.global.manager()?;
    match cli.command {
        Command::Build(args) => build::execute(&manager, args),
        Command::Run(args) => run::execute(&manager, args),
        Command::Exec(args) => exec::execute(&manager, args),
        Command::Code(args) => code::execute(&manager, args),
        Command::Logs(args) => logs::execute(&manager, &args),
        Command::Start(args) => lifecycle::start(&manager, &args),
        Command::Stop(args) => lifecycle::stop(&manager, &args),
        Command::Restart(args) => lifecycle::restart(&manager, &args),
        Command::Rm(args) => lifecycle::remove(&manager, &args),
        Command::Inspect(args) => inspect::execute(&manager, &args),
        Command::Rmi(args) => rmi::execute(&manager, &args),
    }
}

/// Looks up a sandbox by id or name.
fn lookup(
    manager: &SandboxManager,
    container: &str,
    variant: Option<ImageVariant>,
) -> anyhow::Result<Container> {
    manager
        .get(&ContainerId::new(container), variant)
        .with_context(|| format!("looking up sandbox {container}"))
}
