use reporpc_common::{ExecutionResult, Project, UnknownProject};
use std::io;
use std::path::PathBuf;

/// Failure of a single execution request
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    UnknownProject(#[from] UnknownProject),

    /// Writing the source file, or reading the child's output once it started
    #[error("i/o failure on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to launch {program}: {source}")]
    Launch { program: String, source: io::Error },

    #[error("process exited with {}: {}", exit_label(.code), .stderr.trim_end())]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("process exceeded the {timeout_ms}ms deadline and was killed")]
    Timeout { timeout_ms: u64 },

    #[error("execution task failed: {0}")]
    TaskFailed(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

impl ExecError {
    /// Stable snake_case name, used in HTTP bodies and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            ExecError::UnknownProject(_) => "unknown_project",
            ExecError::Io { .. } => "io",
            ExecError::Launch { .. } => "launch",
            ExecError::NonZeroExit { .. } => "non_zero_exit",
            ExecError::Timeout { .. } => "timeout",
            ExecError::TaskFailed(_) => "task_failed",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }
}

/// Outcome of one request within a batch
#[derive(Debug)]
pub struct RequestOutcome {
    pub index: usize,
    pub project: Project,
    pub result: Result<ExecutionResult, ExecError>,
}

/// One or more members of a fan-out batch failed
///
/// Carries every outcome, successes included, in request order.
#[derive(Debug, thiserror::Error)]
#[error("{} of {} requests failed", count_failures(.outcomes), .outcomes.len())]
pub struct AggregateError {
    pub outcomes: Vec<RequestOutcome>,
}

fn count_failures(outcomes: &[RequestOutcome]) -> usize {
    outcomes.iter().filter(|o| o.result.is_err()).count()
}

impl AggregateError {
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ExecError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.index, e)))
    }
}

/// All outcomes of a fan-out batch, in request order
#[derive(Debug)]
pub struct BatchOutcome {
    pub outcomes: Vec<RequestOutcome>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Full ordered result list, or every outcome when anything failed
    pub fn into_results(self) -> Result<Vec<ExecutionResult>, AggregateError> {
        if !self.is_success() {
            return Err(AggregateError {
                outcomes: self.outcomes,
            });
        }
        Ok(self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.ok())
            .collect())
    }
}
