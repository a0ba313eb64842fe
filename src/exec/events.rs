use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::FileTreeNode;

/// Terminal status of a script run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Success,
    Warn,
    Fail,
}

impl ExecStatus {
    /// `0` succeeds, `2` warns, anything else fails.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => ExecStatus::Success,
            2 => ExecStatus::Warn,
            _ => ExecStatus::Fail,
        }
    }

    /// Whether post-run capture (env, outputs, files) should happen
    pub fn is_ok(&self) -> bool {
        matches!(self, ExecStatus::Success | ExecStatus::Warn)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecStatus::Success => "success",
            ExecStatus::Warn => "warn",
            ExecStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file copied out of the run's scratch directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFile {
    /// Relative path, forward slashes
    pub path: String,
    pub size: u64,
}

/// Ordered events emitted while a script runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecEvent {
    /// One line of stdout or stderr
    Log {
        line: String,
        timestamp: DateTime<Utc>,
    },

    /// Final exit status; `-1` on timeout
    Status {
        status: ExecStatus,
        #[serde(rename = "exitCode")]
        exit_code: i32,
    },

    /// Named outputs the script wrote to `$RUNBOOK_OUTPUT`
    Outputs { outputs: HashMap<String, String> },

    FilesCaptured {
        files: Vec<CapturedFile>,
        count: usize,
        #[serde(rename = "fileTree")]
        file_tree: Vec<FileTreeNode>,
    },

    /// The run could not proceed (spawn or pipe failure)
    Error { message: String },

    Done,
}

impl ExecEvent {
    pub fn log(line: impl Into<String>) -> Self {
        ExecEvent::Log {
            line: line.into(),
            timestamp: Utc::now(),
        }
    }

    /// SSE event name for this variant
    pub fn event_name(&self) -> &'static str {
        match self {
            ExecEvent::Log { .. } => "log",
            ExecEvent::Status { .. } => "status",
            ExecEvent::Outputs { .. } => "outputs",
            ExecEvent::FilesCaptured { .. } => "files_captured",
            ExecEvent::Error { .. } => "error",
            ExecEvent::Done => "done",
        }
    }
}
