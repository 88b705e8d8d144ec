//! System-wide constants and defaults.

/// Application name used in CLI output and log fields.
pub const APP_NAME: &str = "sandcastle";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "sandcastle";

/// Container engine CLI invoked by the Docker backend.
pub const DEFAULT_ENGINE_BINARY: &str = "docker";

/// Prefix of every image tag: `di-<build-definition-name>-<hex>`.
pub const IMAGE_TAG_PREFIX: &str = "di";

/// Prefix of every container name: `sandbox-<hex>`.
pub const CONTAINER_NAME_PREFIX: &str = "sandbox";

/// Default length of the random suffix in image tags.
pub const DEFAULT_TAG_SUFFIX_LEN: usize = 16;

/// Default length of the random suffix in container names.
pub const DEFAULT_CONTAINER_NAME_LEN: usize = 16;

/// Default memory ceiling for sandbox containers.
pub const DEFAULT_MEMORY_LIMIT: &str = "500M";

/// Default CPU quota: 1% of one core, in nano-CPUs.
pub const DEFAULT_NANO_CPUS: u64 = 10_000_000;

/// Smallest memory limit the engine accepts (6 MiB).
pub const MIN_MEMORY_BYTES: u64 = 6 * 1024 * 1024;

/// Default deadline for a single command execution, in seconds.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Seconds the engine waits after SIGTERM before killing a stopping container.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Network mode applied to every sandbox container.
pub const SANDBOX_NETWORK_MODE: &str = "none";

/// Environment variable overriding the engine binary.
pub const ENV_ENGINE_BINARY: &str = "SANDCASTLE_DOCKER_BIN";

/// Environment variable naming the engine control socket.
pub const ENV_ENGINE_HOST: &str = "DOCKER_HOST";

/// Environment variable overriding the build-definition directory.
pub const ENV_RECIPE_DIR: &str = "SANDCASTLE_RECIPE_DIR";

/// Environment variable overriding the default memory limit.
pub const ENV_MEMORY_LIMIT: &str = "SANDCASTLE_MEMORY";

/// Environment variable overriding the default CPU quota.
pub const ENV_NANO_CPUS: &str = "SANDCASTLE_NANO_CPUS";

/// Environment variable overriding the exec deadline; `0` disables it.
pub const ENV_EXEC_TIMEOUT: &str = "SANDCASTLE_EXEC_TIMEOUT";
