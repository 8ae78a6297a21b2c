use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;

/// A fully resolved download-tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment variables on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// The transfer is a multi-file group (enables part-aware progress).
    pub grouped: bool,
    /// Command-line signature used to kill stray processes from a previous run.
    pub stale_signature: Option<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            grouped: false,
            stale_signature: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn grouped(mut self, grouped: bool) -> Self {
        self.grouped = grouped;
        self
    }

    pub fn with_stale_signature(mut self, signature: impl Into<String>) -> Self {
        self.stale_signature = Some(signature.into());
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Notified when a tool process starts and exits.
///
/// Used to keep the per-session process registry in sync for forced kills.
pub trait ProcessObserver: Send + Sync {
    fn process_started(&self, pid: u32);
    fn process_exited(&self, pid: u32);
}

/// Caller-side hooks for one [`ProcessRunner::run`](super::ProcessRunner::run) call.
#[derive(Clone)]
pub struct RunHooks {
    pub cancel: CancellationToken,
    pub progress: Option<Arc<dyn ProgressSink>>,
    pub observer: Option<Arc<dyn ProcessObserver>>,
}

impl RunHooks {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            progress: None,
            observer: None,
        }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProcessObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

impl Default for RunHooks {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

/// Bounded buffer of the most recent non-empty output lines.
#[derive(Debug, Clone)]
pub struct OutputTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl OutputTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The last `n` lines joined with ` | `.
    pub fn recent(&self, n: usize) -> String {
        let skip = self.lines.len().saturating_sub(n);
        self.lines
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
