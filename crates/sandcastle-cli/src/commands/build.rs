//! `sandcastle build` — Build a sandbox image from a variant's build definition.

use std::path::PathBuf;

use clap::Args;
use sandcastle_image::ImageVariant;
use sandcastle_runtime::SandboxManager;

use crate::output;

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Image variant to build (`python` or `ubuntu`).
    pub variant: ImageVariant,

    /// Build context directory; defaults to the recipe directory.
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Length of the random hex suffix in the image tag.
    #[arg(long)]
    pub suffix_len: Option<usize>,

    /// Print the engine's build trace as JSON lines.
    #[arg(long)]
    pub logs: bool,
}

/// Executes the `build` command and prints the new image tag.
///
/// # Errors
///
/// Returns an error if the build definition is missing or the build fails.
pub fn execute(manager: &SandboxManager, args: BuildArgs) -> anyhow::Result<()> {
    let context = args.context.unwrap_or_else(|| manager.default_context());
    let suffix_len = args
        .suffix_len
        .unwrap_or(manager.config().tag_suffix_len);
    let mut image = manager.build_with(args.variant, &context, suffix_len)?;

    if args.logs {
        for event in image.take_build_logs() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    output::print_image(&image);
    Ok(())
}
