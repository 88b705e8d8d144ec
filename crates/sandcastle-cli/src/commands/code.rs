//! `sandcastle code` — Run source code through a sandbox's interpreter.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use sandcastle_image::ImageVariant;
use sandcastle_runtime::SandboxManager;

/// Arguments for the `code` command.
#[derive(Args, Debug)]
pub struct CodeArgs {
    /// Sandbox ID or name.
    pub container: String,

    /// Variant the sandbox was created from.
    #[arg(long)]
    pub variant: ImageVariant,

    /// Source code to run.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub source: Option<String>,

    /// Read the source code from a file instead.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Executes the `code` command, forwarding the interpreter's output.
///
/// # Errors
///
/// Returns an error if the variant cannot run code, the sandbox is not
/// running, or the deadline expires.
pub fn execute(manager: &SandboxManager, args: CodeArgs) -> anyhow::Result<()> {
    let source = match (args.source, &args.file) {
        (Some(source), _) => source,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => anyhow::bail!("no source code given"),
    };
    let container = super::lookup(manager, &args.container, Some(args.variant))?;
    let output = container.run_code(&source)?;
    print!("{output}");
    Ok(())
}
