//! Docker-compatible engine backend driving the engine CLI.
//!
//! Each operation is one CLI invocation, so every call opens and releases its
//! own connection to the control socket. Podman works too via the `binary`
//! setting.

use std::process::{Command, Output, Stdio};

use chrono::{DateTime, FixedOffset};
use sandcastle_common::config::SandboxConfig;
use sandcastle_common::error::{Result, SandboxError};
use sandcastle_common::types::{BuildLogEvent, ContainerId, ContainerState, ImageTag};
use serde::Deserialize;

use super::{BuildOutcome, BuildRequest, ContainerInfo, ContainerSpec, EngineBackend};

/// Backend that shells out to a Docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerBackend {
    binary: String,
    host: Option<String>,
    stop_timeout_secs: u64,
}

impl DockerBackend {
    /// Creates a backend for the given engine binary.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            host: None,
            stop_timeout_secs: sandcastle_common::constants::DEFAULT_STOP_TIMEOUT_SECS,
        }
    }

    /// Creates a backend from the engine section of `config`.
    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            binary: config.engine.binary.clone(),
            host: config.engine.host.clone(),
            stop_timeout_secs: config.stop_timeout_secs,
        }
    }

    /// Targets a specific control socket instead of the engine default.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the grace period used by `stop` and `restart`.
    #[must_use]
    pub const fn with_stop_timeout(mut self, secs: u64) -> Self {
        self.stop_timeout_secs = secs;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = &self.host {
            let _ = cmd.args(["--host", host.as_str()]);
        }
        let _ = cmd.stdin(Stdio::null());
        cmd
    }

    fn invoke(&self, operation: &'static str, args: &[&str]) -> Result<Output> {
        tracing::debug!(binary = %self.binary, operation, ?args, "invoking engine");
        self.command()
            .args(args)
            .output()
            .map_err(|e| SandboxError::EngineUnavailable {
                message: format!("cannot run {}: {e}", self.binary),
            })
    }

    /// Invokes the engine and returns stdout, classifying any failure.
    fn checked(&self, operation: &'static str, target: &str, args: &[&str]) -> Result<String> {
        let output = self.invoke(operation, args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(classify(
            operation,
            target,
            &String::from_utf8_lossy(&output.stderr),
        ))
    }

    fn image_id(&self, tag: &ImageTag) -> Option<String> {
        self.checked(
            "image inspect",
            tag.as_str(),
            &["image", "inspect", "--format", "{{.Id}}", tag.as_str()],
        )
        .ok()
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
    }

    /// Removes the container a failed `run` created but never started.
    ///
    /// Only a container in the `created` state from the requested image is
    /// touched; any other container holding the name belongs to someone else.
    fn discard_unstarted(&self, spec: &ContainerSpec) {
        let Ok(info) = self.inspect(&ContainerId::new(spec.name.as_str())) else {
            return;
        };
        let ours = info.name == spec.name
            && info.image == spec.image.as_str()
            && info.state == ContainerState::Created;
        if !ours {
            tracing::debug!(name = %spec.name, state = %info.state, "leaving foreign container in place");
            return;
        }
        tracing::debug!(id = %info.id, name = %spec.name, "removing container left by failed run");
        if let Err(e) = self.remove(&info.id) {
            tracing::warn!(id = %info.id, error = %e, "failed to remove unstarted container");
        }
    }
}

impl EngineBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn is_available(&self) -> bool {
        if which::which(&self.binary).is_err() {
            return false;
        }
        self.invoke("version", &["version", "--format", "{{.Server.Version}}"])
            .is_ok_and(|out| out.status.success())
    }

    fn build_image(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        let definition = request.definition.to_string_lossy().into_owned();
        let context = request.context.to_string_lossy().into_owned();
        let tag = request.tag.as_str();
        tracing::info!(%tag, definition = %definition, "building image");

        let output = self.invoke(
            "build",
            &["build", "--file", definition.as_str(), "--tag", tag, context.as_str()],
        )?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut events: Vec<BuildLogEvent> = stdout
            .lines()
            .chain(stderr.lines())
            .map(stream_event)
            .collect();

        if !output.status.success() {
            let err = classify("build", tag, &stderr);
            if matches!(err, SandboxError::EngineUnavailable { .. }) {
                return Err(err);
            }
            let message = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map_or_else(|| format!("engine exited with {}", output.status), str::to_owned);
            events.push(error_event(&message));
            return Err(SandboxError::BuildFailed {
                tag: tag.to_owned(),
                message,
                logs: events,
            });
        }

        let image_id = self.image_id(&request.tag);
        if let Some(id) = &image_id {
            events.push(aux_event(id));
        }
        Ok(BuildOutcome { image_id, events })
    }

    fn remove_image(&self, tag: &ImageTag) -> Result<()> {
        let _ = self.checked("image rm", tag.as_str(), &["image", "rm", tag.as_str()])?;
        Ok(())
    }

    fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let memory = spec.limits.memory_bytes.to_string();
        let cpus = spec.limits.cpus_decimal();
        let mut args: Vec<&str> = vec![
            "run",
            "--detach",
            "--name",
            spec.name.as_str(),
            "--memory",
            memory.as_str(),
            "--memory-swap",
            memory.as_str(),
            "--cpus",
            cpus.as_str(),
            "--network",
            spec.network_mode,
            "--pull",
            "never",
        ];
        if spec.tty {
            args.push("--tty");
        }
        if spec.stdin_open {
            args.push("--interactive");
        }
        args.push(spec.image.as_str());
        if let Some(command) = &spec.command {
            args.extend(["sh", "-c", command.as_str()]);
        }

        let output = self.invoke("run", &args)?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Ok(ContainerId::new(stdout.trim()));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !is_name_conflict(&stderr) {
            self.discard_unstarted(spec);
        }
        Err(classify("run", spec.image.as_str(), &stderr))
    }

    fn inspect(&self, id: &ContainerId) -> Result<ContainerInfo> {
        let stdout = self.checked(
            "inspect",
            id.as_str(),
            &["inspect", "--type", "container", "--format", "{{json .}}", id.as_str()],
        )?;
        parse_inspect(&stdout)
    }

    fn start(&self, id: &ContainerId) -> Result<()> {
        let _ = self.checked("start", id.as_str(), &["start", id.as_str()])?;
        Ok(())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        let grace = self.stop_timeout_secs.to_string();
        let _ = self.checked("stop", id.as_str(), &["stop", "-t", grace.as_str(), id.as_str()])?;
        Ok(())
    }

    fn restart(&self, id: &ContainerId) -> Result<()> {
        let grace = self.stop_timeout_secs.to_string();
        let _ = self.checked("restart", id.as_str(), &["restart", "-t", grace.as_str(), id.as_str()])?;
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let _ = self.checked("rm", id.as_str(), &["rm", "--force", id.as_str()])?;
        Ok(())
    }

    fn exec(&self, id: &ContainerId, command: &str) -> Result<String> {
        let output = self.invoke("exec", &["exec", "--tty", id.as_str(), "sh", "-c", command])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        // With a TTY the command's own output all arrives on stdout, so a
        // non-zero exit with an empty stderr is the command failing, not exec.
        if output.status.success() || stderr.trim().is_empty() {
            return Ok(normalize_tty(&stdout));
        }
        Err(classify("exec", id.as_str(), &stderr))
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        let output = self.invoke("logs", &["logs", "--timestamps", id.as_str()])?;
        if !output.status.success() {
            return Err(classify(
                "logs",
                id.as_str(),
                &String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(merge_timestamped(
            &normalize_tty(&String::from_utf8_lossy(&output.stdout)),
            &normalize_tty(&String::from_utf8_lossy(&output.stderr)),
        ))
    }
}

/// Maps engine CLI error text onto the typed error kinds.
fn classify(operation: &'static str, target: &str, stderr: &str) -> SandboxError {
    let message = stderr.trim().to_owned();
    let lower = message.to_ascii_lowercase();

    if lower.contains("cannot connect to the docker daemon")
        || lower.contains("error during connect")
        || lower.contains("is the docker daemon running")
        || lower.contains("permission denied while trying to connect")
        || lower.contains("cannot connect to podman")
    {
        return SandboxError::EngineUnavailable { message };
    }
    if lower.contains("no such container") {
        return SandboxError::not_found(target);
    }
    if lower.contains("no such image")
        || lower.contains("image not known")
        || lower.contains("unable to find image")
        || lower.contains("pull access denied")
    {
        return SandboxError::ImageNotFound {
            tag: target.to_owned(),
        };
    }

    match operation {
        "run" if is_limit_rejection(&lower) => SandboxError::ResourceLimitInvalid { message },
        "exec" if lower.contains("is paused") => SandboxError::ContainerNotRunning {
            id: ContainerId::new(target),
            state: ContainerState::Paused,
        },
        "exec" if lower.contains("is not running") => SandboxError::ContainerNotRunning {
            id: ContainerId::new(target),
            state: ContainerState::Stopped,
        },
        "exec" => SandboxError::ExecutionEngineError {
            id: ContainerId::new(target),
            message,
        },
        _ => SandboxError::Engine { operation, message },
    }
}

fn is_name_conflict(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("is already in use")
}

fn is_limit_rejection(lower: &str) -> bool {
    lower.contains("minimum memory limit")
        || lower.contains("memory limit")
        || lower.contains("range of cpus")
        || lower.contains("nanocpus")
        || lower.contains("cpu quota")
        || (lower.contains("invalid argument") && (lower.contains("--memory") || lower.contains("--cpus")))
}

fn normalize_tty(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Interleaves `logs --timestamps` stdout and stderr back into write order
/// and strips the timestamps.
///
/// A line without a parseable timestamp keeps the one before it. Ties keep
/// stdout first, then the engine's order within each stream.
fn merge_timestamped(stdout: &str, stderr: &str) -> String {
    let mut lines: Vec<(Option<DateTime<FixedOffset>>, usize, &str)> = Vec::new();
    for (stream, text) in [stdout, stderr].into_iter().enumerate() {
        let mut last = None;
        for line in text.split_inclusive('\n') {
            let (stamp, body) = match line.split_once(' ') {
                Some((ts, rest)) => match DateTime::parse_from_rfc3339(ts) {
                    Ok(at) => (Some(at), rest),
                    Err(_) => (last, line),
                },
                None => (last, line),
            };
            last = stamp;
            lines.push((stamp, stream, body));
        }
    }
    lines.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    lines.into_iter().map(|(_, _, body)| body).collect()
}

fn stream_event(line: &str) -> BuildLogEvent {
    let mut event = BuildLogEvent::new();
    let _ = event.insert("stream".into(), format!("{line}\n").into());
    event
}

fn error_event(message: &str) -> BuildLogEvent {
    let mut event = BuildLogEvent::new();
    let _ = event.insert("error".into(), message.into());
    let _ = event.insert(
        "errorDetail".into(),
        serde_json::json!({ "message": message }),
    );
    event
}

fn aux_event(image_id: &str) -> BuildLogEvent {
    let mut event = BuildLogEvent::new();
    let _ = event.insert("aux".into(), serde_json::json!({ "ID": image_id }));
    event
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectDoc {
    id: String,
    name: String,
    created: String,
    state: InspectState,
    config: InspectConfig,
    host_config: InspectHostConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHostConfig {
    network_mode: String,
}

fn parse_inspect(json: &str) -> Result<ContainerInfo> {
    let doc: InspectDoc = serde_json::from_str(json.trim())?;
    Ok(ContainerInfo {
        id: ContainerId::new(doc.id),
        name: doc.name.trim_start_matches('/').to_owned(),
        image: doc.config.image,
        state: doc.state.status.parse()?,
        network_mode: doc.host_config.network_mode,
        created_at: doc.created,
    })
}
