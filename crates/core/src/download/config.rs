//! Download tool configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::runner::ToolCommand;

/// How to invoke the external download tool.
///
/// The final command line is
/// `program args.. source_flag <uri> dest_flag <dir> extra_args.. [group_flag]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadToolConfig {
    /// Tool binary, looked up on `PATH` when not absolute.
    #[serde(default = "default_program")]
    pub program: String,

    /// Subcommand and leading arguments.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    #[serde(default = "default_source_flag")]
    pub source_flag: String,

    #[serde(default = "default_dest_flag")]
    pub dest_flag: String,

    /// Appended for grouped (multi-file) transfers.
    #[serde(default = "default_group_flag")]
    pub group_flag: String,

    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,

    /// Environment variable that points the tool at its home directory.
    #[serde(default = "default_home_env")]
    pub home_env: String,

    /// Tool home directory (session data). Created on submit when set.
    #[serde(default)]
    pub home_dir: Option<PathBuf>,

    /// Command-line pattern matched to kill leftover tool processes before
    /// a new run. `None` disables the sweep.
    #[serde(default = "default_stale_signature")]
    pub stale_signature: Option<String>,
}

fn default_program() -> String {
    "tdl".to_string()
}

fn default_args() -> Vec<String> {
    vec!["dl".to_string()]
}

fn default_source_flag() -> String {
    "-u".to_string()
}

fn default_dest_flag() -> String {
    "-d".to_string()
}

fn default_group_flag() -> String {
    "--group".to_string()
}

fn default_extra_args() -> Vec<String> {
    [
        "-t",
        "16",
        "-l",
        "9",
        "--reconnect-timeout",
        "0",
        "--template",
        "{{ .FileName }}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_home_env() -> String {
    "TDL_HOME".to_string()
}

fn default_stale_signature() -> Option<String> {
    Some("tdl dl".to_string())
}

impl Default for DownloadToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            source_flag: default_source_flag(),
            dest_flag: default_dest_flag(),
            group_flag: default_group_flag(),
            extra_args: default_extra_args(),
            home_env: default_home_env(),
            home_dir: None,
            stale_signature: default_stale_signature(),
        }
    }
}

impl DownloadToolConfig {
    /// Create a config for a custom tool with no extra arguments.
    pub fn for_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            extra_args: Vec::new(),
            stale_signature: None,
            ..Self::default()
        }
    }

    pub fn with_home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    /// Build the tool invocation for one download.
    pub fn build_command(&self, uri: &str, dir: &Path, grouped: bool) -> ToolCommand {
        let mut command = ToolCommand::new(&self.program)
            .args(self.args.iter().cloned())
            .arg(&self.source_flag)
            .arg(uri)
            .arg(&self.dest_flag)
            .arg(dir.to_string_lossy())
            .args(self.extra_args.iter().cloned())
            .grouped(grouped);

        if grouped && !command.args.iter().any(|a| a == &self.group_flag) {
            command = command.arg(&self.group_flag);
        }
        if let Some(home) = &self.home_dir {
            command = command.env(&self.home_env, home.to_string_lossy());
        }
        if let Some(signature) = &self.stale_signature {
            command = command.with_stale_signature(signature);
        }
        command
    }
}
