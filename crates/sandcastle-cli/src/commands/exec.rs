//! `sandcastle exec` — Run a shell command inside a running sandbox.

use clap::Args;
use sandcastle_runtime::SandboxManager;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Sandbox ID or name.
    pub container: String,

    /// Command to execute; words are joined and run through `sh -c`.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command, forwarding the command's combined output.
///
/// # Errors
///
/// Returns an error if the sandbox is not running, the engine cannot attach,
/// or the deadline expires.
pub fn execute(manager: &SandboxManager, args: ExecArgs) -> anyhow::Result<()> {
    let container = super::lookup(manager, &args.container, None)?;
    let output = container.run_command(&args.command.join(" "))?;
    print!("{output}");
    Ok(())
}
