//! `sandcastle rmi` — Delete a sandbox image.

use clap::Args;
use sandcastle_common::types::ImageTag;
use sandcastle_runtime::SandboxManager;

/// Arguments for the `rmi` command.
#[derive(Args, Debug)]
pub struct RmiArgs {
    /// Image tag to delete.
    pub tag: String,
}

/// Executes the `rmi` command.
///
/// # Errors
///
/// Returns an error if the tag is unknown or still in use.
pub fn execute(manager: &SandboxManager, args: &RmiArgs) -> anyhow::Result<()> {
    manager.delete_image_tag(&ImageTag::new(args.tag.as_str()))?;
    println!("Deleted: {}", args.tag);
    Ok(())
}
