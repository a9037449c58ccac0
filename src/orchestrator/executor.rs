//! Builder execution: subprocess spawning, output streaming, cancellation.
//!
//! Every invocation is echoed as `Executing: <argv>` on the `parsed` log target
//! before the process starts. Output lines from both streams are forwarded to
//! the log as they arrive. A cancellation signal kills the child and its whole
//! process group rather than merely abandoning the wait.

use futures::future::{BoxFuture, FutureExt};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;

use crate::error::BuildError;

/// Runs the external image builder with precomputed arguments.
pub trait ImageBuilder: Send + Sync {
    /// Run one builder invocation to completion.
    ///
    /// `stage` names the pipeline step for error reporting.
    fn execute<'a>(
        &'a self,
        stage: &'a str,
        args: Vec<String>,
        cancel_rx: watch::Receiver<bool>,
    ) -> BoxFuture<'a, Result<(), BuildError>>;
}

/// Builder backed by a container CLI binary such as `docker` or `podman`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        DockerCli {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ImageBuilder for DockerCli {
    fn execute<'a>(
        &'a self,
        stage: &'a str,
        args: Vec<String>,
        cancel_rx: watch::Receiver<bool>,
    ) -> BoxFuture<'a, Result<(), BuildError>> {
        run_builder(&self.program, stage, args, cancel_rx).boxed()
    }
}

/// Resolve once the watch value turns `true`.
///
/// Never resolves if the sender is dropped without cancelling.
pub async fn wait_for_cancel(cancel_rx: &mut watch::Receiver<bool>) {
    let closed = cancel_rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Render an argument vector the way it is echoed to the operator.
pub fn format_invocation(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawn `program args...`, stream its output, and map its exit status.
///
/// # Returns
/// * `Ok(())` if the process exits successfully
/// * `Err(BuildError::BuildFailed)` on a non-zero exit or signal termination
/// * `Err(BuildError::BuildCancelled)` if cancelled before or during the run
/// * `Err(BuildError::Spawn)` if the process cannot be started
pub async fn run_builder(
    program: &str,
    stage: &str,
    args: Vec<String>,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<(), BuildError> {
    if *cancel_rx.borrow() {
        return Err(BuildError::BuildCancelled);
    }

    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so cancellation reaches grandchildren too
    #[cfg(unix)]
    command.process_group(0);

    log::info!(target: "parsed", "Executing: {}", format_invocation(program, &args));

    let mut child = command
        .spawn()
        .map_err(|e| BuildError::Spawn(format!("{}: {}", program, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BuildError::Spawn("Failed to capture stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| BuildError::Spawn("Failed to capture stderr".to_string()))?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut stdout_closed = false;
    let mut stderr_closed = false;

    while !(stdout_closed && stderr_closed) {
        tokio::select! {
            line = stdout_lines.next_line(), if !stdout_closed => match line {
                Ok(Some(line)) => log::info!("{}", line),
                Ok(None) => stdout_closed = true,
                Err(e) => {
                    log::warn!("stdout read error: {}", e);
                    stdout_closed = true;
                }
            },
            line = stderr_lines.next_line(), if !stderr_closed => match line {
                Ok(Some(line)) => log::info!("[STDERR] {}", line),
                Ok(None) => stderr_closed = true,
                Err(e) => {
                    log::warn!("stderr read error: {}", e);
                    stderr_closed = true;
                }
            },
            _ = wait_for_cancel(&mut cancel_rx) => {
                terminate(&mut child).await;
                return Err(BuildError::BuildCancelled);
            }
        }
    }

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| {
            BuildError::failed(stage, format!("failed to wait for process: {}", e))
        })?,
        _ = wait_for_cancel(&mut cancel_rx) => {
            terminate(&mut child).await;
            return Err(BuildError::BuildCancelled);
        }
    };

    if status.success() {
        log::info!("{} completed", stage);
        Ok(())
    } else {
        let reason = exit_reason(status);
        log::error!("{} did not run successfully: {}", stage, reason);
        Err(BuildError::failed(stage, reason))
    }
}

fn exit_reason(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

async fn terminate(child: &mut Child) {
    log::warn!("Cancellation requested, terminating builder process");

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            log::debug!("killpg({}) failed: {}", pid, e);
        }
    }

    if let Err(e) = child.kill().await {
        log::warn!("Failed to kill builder process: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_format_invocation() {
        assert_eq!(
            format_invocation("docker", &args(&["build", "-t", "x"])),
            "docker build -t x"
        );
        assert_eq!(format_invocation("docker", &[]), "docker");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_process() {
        let (_tx, rx) = watch::channel(false);
        let result = run_builder("sh", "test stage", args(&["-c", "echo hello"]), rx).await;
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_process_reports_build_failed() {
        let (_tx, rx) = watch::channel(false);
        let result = run_builder("sh", "test stage", args(&["-c", "exit 3"]), rx).await;
        match result {
            Err(BuildError::BuildFailed { stage, reason }) => {
                assert_eq!(stage, "test stage");
                assert_eq!(reason, "exit code 3");
            }
            other => panic!("expected BuildFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_reports_spawn_error() {
        let (_tx, rx) = watch::channel(false);
        let result = run_builder("definitely-not-a-real-builder-binary", "s", vec![], rx).await;
        assert!(matches!(result, Err(BuildError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_spawn() {
        let (_tx, rx) = watch::channel(true);
        let result = run_builder("definitely-not-a-real-builder-binary", "s", vec![], rx).await;
        assert!(matches!(result, Err(BuildError::BuildCancelled)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_running_process() {
        let (tx, rx) = watch::channel(false);
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            run_builder("sh", "long stage", args(&["-c", "sleep 30"]), rx).await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(BuildError::BuildCancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let result = run_builder("sh", "s", args(&["-c", "true"]), rx).await;
        assert!(result.is_ok());
    }
}
