//! `sandcastle logs` — View sandbox logs.

use clap::Args;
use sandcastle_runtime::SandboxManager;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Sandbox ID or name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the sandbox is not found.
pub fn execute(manager: &SandboxManager, args: &LogsArgs) -> anyhow::Result<()> {
    let logs = super::lookup(manager, &args.container, None)?.logs()?;

    if logs.is_empty() {
        println!("No logs available for sandbox: {}", args.container);
    } else {
        print!("{logs}");
    }

    Ok(())
}
