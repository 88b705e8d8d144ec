//! `sandcastle start|stop|restart|rm` — Sandbox lifecycle transitions.

use clap::Args;
use sandcastle_runtime::SandboxManager;

/// Names the sandbox a lifecycle command acts on.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Sandbox ID or name.
    pub container: String,
}

/// Starts a stopped sandbox.
///
/// # Errors
///
/// Returns an error if the sandbox is unknown or already running.
pub fn start(manager: &SandboxManager, args: &TargetArgs) -> anyhow::Result<()> {
    super::lookup(manager, &args.container, None)?.start()?;
    println!("{}", args.container);
    Ok(())
}

/// Stops a running sandbox.
///
/// # Errors
///
/// Returns an error if the sandbox is unknown or not running.
pub fn stop(manager: &SandboxManager, args: &TargetArgs) -> anyhow::Result<()> {
    super::lookup(manager, &args.container, None)?.stop()?;
    println!("{}", args.container);
    Ok(())
}

/// Restarts a running or stopped sandbox.
///
/// # Errors
///
/// Returns an error if the sandbox is unknown or in a state that cannot restart.
pub fn restart(manager: &SandboxManager, args: &TargetArgs) -> anyhow::Result<()> {
    super::lookup(manager, &args.container, None)?.restart()?;
    println!("{}", args.container);
    Ok(())
}

/// Removes a sandbox regardless of its state.
///
/// # Errors
///
/// Returns an error if the sandbox is unknown.
pub fn remove(manager: &SandboxManager, args: &TargetArgs) -> anyhow::Result<()> {
    let mut container = super::lookup(manager, &args.container, None)?;
    container.remove()?;
    println!("{}", args.container);
    Ok(())
}
