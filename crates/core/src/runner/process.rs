//! Download-tool process runner implementation.

use std::process::{ExitStatus, Stdio};

use futures::StreamExt;
use once_cell::sync::Lazy;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::progress::{ProgressConfig, ProgressSink, ProgressTracker, ProgressUpdate};

use super::config::RunnerConfig;
use super::error::RunnerError;
use super::types::{OutputTail, RunHooks, ToolCommand};

/// Only one download-tool process may be alive at a time, process-wide.
static TOOL_SLOT: Lazy<Semaphore> = Lazy::new(|| Semaphore::new(1));

/// Longest output line accepted before the stream is abandoned.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Buffered lines between the pipe readers and the read loop.
const LINE_BUFFER: usize = 256;

/// Runs the external download tool with retries, idle detection and progress.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: RunnerConfig,
    progress: ProgressConfig,
}

enum Attempt {
    Succeeded,
    Failed { reason: String },
}

enum ReadEnd {
    Eof,
    Idle,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig, progress: ProgressConfig) -> Self {
        Self { config, progress }
    }

    pub fn with_defaults() -> Self {
        Self::new(RunnerConfig::default(), ProgressConfig::default())
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the command until it exits with status 0 or attempts run out.
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` once every attempt failed
    /// (non-zero exit, spawn failure or idle timeout), and
    /// `Err(RunnerError::Cancelled)` when `hooks.cancel` fires. A cancelled
    /// process is killed and awaited before returning.
    pub async fn run(&self, command: &ToolCommand, hooks: RunHooks) -> Result<bool, RunnerError> {
        if command.program.as_os_str().is_empty() {
            return Err(RunnerError::invalid_command("empty program"));
        }

        let _permit = tokio::select! {
            biased;
            _ = hooks.cancel.cancelled() => return Err(RunnerError::Cancelled),
            permit = TOOL_SLOT.acquire() => permit.map_err(|_| RunnerError::SlotClosed)?,
        };

        if let Some(signature) = &command.stale_signature {
            kill_stale(signature).await;
        }

        let mut tracker = hooks
            .progress
            .as_ref()
            .map(|_| ProgressTracker::new(self.progress.clone(), command.grouped));
        let mut tail = OutputTail::new(self.config.tail_lines);
        let retries = self.config.retries.max(1);

        for attempt in 1..=retries {
            info!(attempt, retries, command = %command, "Starting download attempt");

            let outcome = self
                .run_attempt(command, &hooks, tracker.as_mut(), &mut tail)
                .await;

            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    metrics::PROCESS_ATTEMPTS
                        .with_label_values(&["cancelled"])
                        .inc();
                    info!(command = %command, "Download cancelled");
                    return Err(e);
                }
            };

            match outcome {
                Attempt::Succeeded => {
                    metrics::PROCESS_ATTEMPTS
                        .with_label_values(&["success"])
                        .inc();
                    if let (Some(tracker), Some(sink)) = (tracker.as_mut(), hooks.progress.as_ref())
                    {
                        if let Some(update) = tracker.finish(tail.last().unwrap_or_default()) {
                            deliver(sink.as_ref(), update).await;
                        }
                    }
                    info!(attempt, "Download completed");
                    return Ok(true);
                }
                Attempt::Failed { reason } => {
                    metrics::PROCESS_ATTEMPTS.with_label_values(&["failed"]).inc();
                    error!(
                        attempt,
                        retries,
                        reason = %reason,
                        last_line = tail.last().unwrap_or_default(),
                        "Download attempt failed"
                    );
                    if !tail.is_empty() {
                        error!(
                            "Download tool tail: {}",
                            tail.recent(self.config.failure_tail_lines)
                        );
                    }
                }
            }

            if attempt < retries {
                tokio::select! {
                    biased;
                    _ = hooks.cancel.cancelled() => {
                        info!(command = %command, "Download cancelled during retry delay");
                        return Err(RunnerError::Cancelled);
                    }
                    _ = tokio::time::sleep(self.config.retry_delay()) => {}
                }
            }
        }

        warn!(retries, command = %command, "Download failed after all attempts");
        Ok(false)
    }

    async fn run_attempt(
        &self,
        command: &ToolCommand,
        hooks: &RunHooks,
        mut tracker: Option<&mut ProgressTracker>,
        tail: &mut OutputTail,
    ) -> Result<Attempt, RunnerError> {
        let mut child = match Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return Ok(Attempt::Failed {
                    reason: format!("failed to spawn {}: {}", command.program.display(), e),
                })
            }
        };

        let pid = child.id();
        if let (Some(observer), Some(pid)) = (hooks.observer.as_ref(), pid) {
            observer.process_started(pid);
        }

        let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let idle = self.config.idle_timeout();
        let end = loop {
            tokio::select! {
                biased;
                _ = hooks.cancel.cancelled() => {
                    terminate(&mut child).await;
                    notify_exit(hooks, pid);
                    return Err(RunnerError::Cancelled);
                }
                next = timeout(idle, line_rx.recv()) => match next {
                    Ok(Some(line)) => {
                        if line.is_empty() {
                            continue;
                        }
                        tail.push(line.as_str());
                        if let (Some(tracker), Some(sink)) = (tracker.as_deref_mut(), hooks.progress.as_ref()) {
                            if let Some(update) = tracker.observe(&line) {
                                deliver(sink.as_ref(), update).await;
                            }
                        }
                    }
                    Ok(None) => break ReadEnd::Eof,
                    Err(_) => break ReadEnd::Idle,
                }
            }
        };

        let status = match end {
            ReadEnd::Eof => {
                tokio::select! {
                    biased;
                    _ = hooks.cancel.cancelled() => {
                        terminate(&mut child).await;
                        notify_exit(hooks, pid);
                        return Err(RunnerError::Cancelled);
                    }
                    status = child.wait() => status,
                }
            }
            ReadEnd::Idle => match child.try_wait() {
                // Exited already; a detached descendant kept the pipe open.
                Ok(Some(status)) => Ok(status),
                _ => {
                    metrics::IDLE_TIMEOUTS.inc();
                    error!(
                        idle_secs = idle.as_secs(),
                        command = %command,
                        "Download idle, terminating"
                    );
                    terminate(&mut child).await;
                    notify_exit(hooks, pid);
                    return Ok(Attempt::Failed {
                        reason: format!("no output for {}s", idle.as_secs()),
                    });
                }
            },
        };
        notify_exit(hooks, pid);

        Ok(match status {
            Ok(status) if status.success() => Attempt::Succeeded,
            Ok(status) => Attempt::Failed {
                reason: describe_exit(status),
            },
            Err(e) => Attempt::Failed {
                reason: format!("failed to wait for process: {}", e),
            },
        })
    }
}

/// Read one pipe, splitting on `\n` and `\r` so progress bars that redraw
/// in place still produce lines.
async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let codec =
        AnyDelimiterCodec::new_with_max_length(b"\r\n".to_vec(), b"\n".to_vec(), MAX_LINE_BYTES);
    let mut frames = FramedRead::new(reader, codec);
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(bytes) => {
                let line = String::from_utf8_lossy(&bytes).trim().to_string();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading tool output");
                break;
            }
        }
    }
}

async fn deliver(sink: &dyn ProgressSink, update: ProgressUpdate) {
    if let Err(e) = sink.on_progress(update).await {
        debug!(error = %e, "Progress callback failed");
    }
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Kill failed, process probably already exited");
    }
}

fn notify_exit(hooks: &RunHooks, pid: Option<u32>) {
    if let (Some(observer), Some(pid)) = (hooks.observer.as_ref(), pid) {
        observer.process_exited(pid);
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Best-effort kill of leftover tool processes owned by this user.
async fn kill_stale(signature: &str) {
    #[cfg(unix)]
    {
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() }.to_string();
        match Command::new("pkill")
            .args(["-u", uid.as_str(), "-f", signature])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            // pkill exits 1 when nothing matched
            Ok(status) if status.success() => {
                warn!(signature, "Killed stale download tool processes");
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "pkill unavailable, skipping stale process cleanup"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signature;
    }
}

/// Send SIGKILL to a process. Returns whether the signal was delivered.
pub fn kill_pid(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: kill(2) only reads its arguments.
        unsafe { libc::kill(pid, libc::SIGKILL) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}
