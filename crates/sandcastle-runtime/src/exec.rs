//! Command and code execution inside running sandbox containers.
//!
//! Calls block until the command finishes. When the container has an
//! execution deadline, the engine call runs on a watcher thread and is raced
//! against it; on expiry the container is stopped, which terminates the
//! command, and the caller gets `SandboxError::ExecutionTimedOut`. A container
//! that refuses to stop is force-removed instead.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use sandcastle_common::error::{Result, SandboxError};
use sandcastle_common::types::ContainerId;

use crate::backend::EngineBackend;
use crate::container::Container;

/// Runs `command` through `sh -c` inside the container and returns the
/// combined output.
///
/// # Errors
///
/// Returns `SandboxError::ContainerNotRunning` if the container is not
/// running, `SandboxError::ExecutionEngineError` if the engine cannot attach,
/// `SandboxError::ExecutionTimedOut` when the deadline expires, or
/// `SandboxError::ContainerNotFound` once the container is removed.
pub fn run_command(container: &Container, command: &str) -> Result<String> {
    let state = container.state()?;
    if !state.is_running() {
        return Err(SandboxError::ContainerNotRunning {
            id: container.id().clone(),
            state,
        });
    }
    tracing::debug!(id = %container.id(), %command, "exec");
    execute(
        container.backend(),
        container.id(),
        command,
        container.exec_timeout(),
    )
}

/// Formats `source` with the container variant's rule and runs it.
///
/// # Errors
///
/// Returns `SandboxError::CodeExecutionUnsupported` if the variant has no
/// formatting rule, otherwise the errors of [`run_command`].
pub fn run_code(container: &Container, source: &str) -> Result<String> {
    container.ensure_present()?;
    let variant = container.variant();
    let command = variant
        .and_then(|v| v.format_code(source))
        .ok_or_else(|| SandboxError::CodeExecutionUnsupported {
            variant: variant.map_or_else(|| "untyped".to_owned(), |v| v.to_string()),
        })?;
    run_command(container, &command)
}

/// Executes on the engine, enforcing `timeout` if given.
fn execute(
    backend: &Arc<dyn EngineBackend>,
    id: &ContainerId,
    command: &str,
    timeout: Option<Duration>,
) -> Result<String> {
    let Some(timeout) = timeout else {
        return backend.exec(id, command);
    };

    let (tx, rx) = mpsc::channel();
    let worker_backend = Arc::clone(backend);
    let worker_id = id.clone();
    let worker_command = command.to_owned();
    let _worker = std::thread::Builder::new()
        .name(format!("sandbox-exec-{id}"))
        .spawn(move || {
            let _ = tx.send(worker_backend.exec(&worker_id, &worker_command));
        })
        .map_err(|e| SandboxError::ExecutionEngineError {
            id: id.clone(),
            message: format!("cannot spawn exec watcher: {e}"),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(%id, timeout_secs = timeout.as_secs_f64(), "exec deadline expired, stopping container");
            terminate(backend, id, timeout)?;
            Err(SandboxError::ExecutionTimedOut {
                id: id.clone(),
                timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(SandboxError::ExecutionEngineError {
            id: id.clone(),
            message: "exec worker exited without a result".into(),
        }),
    }
}

/// Ends a command that outlived its deadline: stops the container, or
/// force-removes it if it will not stop.
///
/// # Errors
///
/// Returns `SandboxError::ExecutionEngineError` when neither works, since the
/// command may then still be running.
fn terminate(
    backend: &Arc<dyn EngineBackend>,
    id: &ContainerId,
    timeout: Duration,
) -> Result<()> {
    let Err(stop_err) = backend.stop(id) else {
        return Ok(());
    };
    tracing::warn!(%id, error = %stop_err, "stop failed after exec timeout, removing container");
    if let Err(remove_err) = backend.remove(id) {
        tracing::error!(%id, error = %remove_err, "failed to remove container after exec timeout");
        return Err(SandboxError::ExecutionEngineError {
            id: id.clone(),
            message: format!(
                "deadline of {}s expired and the container could not be stopped ({stop_err}) \
                 or removed ({remove_err}); the command may still be running",
                timeout.as_secs_f64()
            ),
        });
    }
    Ok(())
}
