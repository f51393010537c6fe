use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Project identifier
/// Closed set - every match over it is exhaustive, so adding a project
/// forces every routing site to handle it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Project {
    Project1,
    Project2,
}

/// Raised when a string names no known project
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown project: {0}")]
pub struct UnknownProject(pub String);

impl Project {
    /// Returns all project variants
    pub fn all_variants() -> &'static [Project] {
        &[Project::Project1, Project::Project2]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Project::Project1 => "project1",
            Project::Project2 => "project2",
        }
    }
}

impl FromStr for Project {
    type Err = UnknownProject;

    /// Case-insensitive parse
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project1" => Ok(Project::Project1),
            "project2" => Ok(Project::Project2),
            _ => Err(UnknownProject(s.to_string())),
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution Request (Immutable)
/// Built by the caller, consumed once by a runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub project: Project,
    pub code: String,
}

impl ExecutionRequest {
    pub fn new(project: Project, code: impl Into<String>) -> Self {
        Self {
            project,
            code: code.into(),
        }
    }
}

/// Execution Output
/// Raw stdout bytes exactly as the child wrote them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    /// stdout decoded as UTF-8, invalid sequences replaced
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}
