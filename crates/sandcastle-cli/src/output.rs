//! Formatted output helpers for CLI commands.
//!
//! Key/value views of images and sandboxes, and human-readable byte sizes.

use sandcastle_image::Image;
use sandcastle_runtime::backend::ContainerInfo;

/// Formats a byte count into a human-readable string (e.g., "500.0 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Renders a built image as aligned `key: value` lines.
#[must_use]
pub fn image_view(image: &Image) -> String {
    format!(
        "tag:      {}\nvariant:  {}\nimage id: {}\nrecipe:   sha256:{}\ncreated:  {}\n",
        image.tag(),
        image.variant(),
        image.engine_id().unwrap_or("-"),
        image.recipe_digest(),
        image.created_at().to_rfc3339(),
    )
}

/// Renders a sandbox's engine view as aligned `key: value` lines.
#[must_use]
pub fn container_view(info: &ContainerInfo) -> String {
    format!(
        "id:       {}\nname:     {}\nimage:    {}\nstate:    {}\nnetwork:  {}\ncreated:  {}\n",
        info.id, info.name, info.image, info.state, info.network_mode, info.created_at,
    )
}

/// Prints [`image_view`] to stdout.
pub fn print_image(image: &Image) {
    print!("{}", image_view(image));
}

/// Prints [`container_view`] to stdout.
pub fn print_container(info: &ContainerInfo) {
    print!("{}", container_view(info));
}
