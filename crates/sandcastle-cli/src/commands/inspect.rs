//! `sandcastle inspect` — Show a sandbox's engine state.

use clap::Args;
use sandcastle_runtime::SandboxManager;

use crate::output;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Sandbox ID or name.
    pub container: String,
}

/// Executes the `inspect` command.
///
/// # Errors
///
/// Returns an error if the sandbox is not found.
pub fn execute(manager: &SandboxManager, args: &InspectArgs) -> anyhow::Result<()> {
    let info = super::lookup(manager, &args.container, None)?.inspect()?;
    output::print_container(&info);
    Ok(())
}
