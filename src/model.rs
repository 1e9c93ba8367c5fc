use crate::error::{Result, SlimmingError};
use std::fmt;
use std::path::PathBuf;

/// API key for the compression service. Never blank once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a candidate key, rejecting blank or whitespace-only input.
    pub fn parse(candidate: &str) -> Result<Self> {
        if candidate.trim().is_empty() {
            return Err(SlimmingError::BlankCredential);
        }
        Ok(Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Keys shorter than this are fully masked in `{:?}` output.
const MIN_KEY_LEN_FOR_TAIL: usize = 12;

// Keys end up in error logs via `{:?}`; only show a short tail.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.chars().count() < MIN_KEY_LEN_FOR_TAIL {
            return write!(f, "Credential(****)");
        }
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "Credential(****{})", tail)
    }
}

/// Previously used input specs, output dirs and prefixes, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageHistory {
    pub input_specs: Vec<String>,
    pub output_dirs: Vec<String>,
    pub prefixes: Vec<String>,
}

impl UsageHistory {
    pub fn is_empty(&self) -> bool {
        self.input_specs.is_empty() && self.output_dirs.is_empty() && self.prefixes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub input_spec: String,
    pub output_dir: PathBuf,
    pub file_prefix: Option<String>,
}

impl BatchRequest {
    pub fn new(
        input_spec: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        file_prefix: Option<String>,
    ) -> Self {
        Self {
            input_spec: input_spec.into(),
            output_dir: output_dir.into(),
            file_prefix,
        }
    }

    /// The prefix to apply, or `None` when it is missing or blank.
    pub fn effective_prefix(&self) -> Option<&str> {
        self.file_prefix
            .as_deref()
            .filter(|prefix| !prefix.trim().is_empty())
    }
}

/// Why a single file could not be compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Success,
    Failure(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub source: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Success,
    /// At least one file failed for a reason other than authorization.
    /// `cause` carries the first failure message.
    PartialFailure { failed: usize, cause: String },
    /// The key was rejected; the batch stopped at the failing file.
    AuthFailure { message: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub total_count: usize,
    pub succeeded_count: usize,
    /// Files the runner started, including the one that halted the batch.
    pub attempted_count: usize,
    pub elapsed_millis: u64,
    pub failures: Vec<FileFailure>,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.outcome == BatchOutcome::Success
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.outcome, BatchOutcome::AuthFailure { .. })
    }
}

/// Per-file progress report emitted by the batch runner.
#[derive(Debug, Clone)]
pub struct FileProgress {
    /// 1-based position within the file set.
    pub index: usize,
    pub total: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub outcome: FileOutcome,
}
