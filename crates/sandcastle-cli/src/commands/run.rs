//! `sandcastle run` — Create and start a sandbox container.

use clap::Args;
use sandcastle_common::types::{ImageTag, ResourceLimits};
use sandcastle_image::ImageVariant;
use sandcastle_runtime::SandboxManager;

use crate::output;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tag of a previously built sandbox image.
    pub tag: String,

    /// Variant the image was built from.
    #[arg(long)]
    pub variant: ImageVariant,

    /// Memory limit (e.g. `500M`, `1g`); the configured default when unset.
    #[arg(long)]
    pub memory: Option<String>,

    /// CPU quota in nano-CPUs; the configured default when unset.
    #[arg(long)]
    pub nano_cpus: Option<u64>,

    /// Start command, run through `sh -c`; the image default when unset.
    #[arg(long, default_value = "")]
    pub command: String,
}

/// Executes the `run` command and prints the new sandbox.
///
/// # Errors
///
/// Returns an error for invalid limits, an unknown image, or engine failures.
pub fn execute(manager: &SandboxManager, args: RunArgs) -> anyhow::Result<()> {
    let defaults = manager.config().default_limits;
    let nano_cpus = args.nano_cpus.unwrap_or(defaults.nano_cpus);
    let limits = match args.memory.as_deref() {
        Some(memory) => ResourceLimits::parse(memory, nano_cpus)?,
        None => ResourceLimits {
            nano_cpus,
            ..defaults
        },
    };

    let container = manager.run_tag(&ImageTag::new(args.tag), args.variant, &args.command, limits)?;
    output::print_container(&container.inspect()?);
    println!("memory:   {}", output::format_bytes(limits.memory_bytes));
    println!("cpus:     {}", limits.cpus_decimal());
    Ok(())
}
