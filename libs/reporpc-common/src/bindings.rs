//! Project bindings - which environment a project's code runs in
//!
//! The table is built once at startup and handed to the dispatcher.
//! Nothing mutates it afterwards, so it is shared behind an `Arc`.

use crate::types::Project;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn default_interpreter() -> Vec<String> {
    vec!["uv".to_string(), "run".to_string(), "python".to_string()]
}

fn default_file_name() -> String {
    "run.py".to_string()
}

/// Execution environment for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectBinding {
    pub project: Project,
    /// Program followed by its leading arguments; the script path is appended
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,
    /// Working directory of the child process
    pub workdir: PathBuf,
    /// Directory the submitted code is written into
    pub script_dir: PathBuf,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Sleep before each run, emulates a cold container in benchmarks
    #[serde(default)]
    pub simulated_latency_ms: u64,
}

impl ProjectBinding {
    /// Default layout: `projects/<name>` is the project root, code lands in `src/<name>/`
    pub fn default_for(project: Project) -> Self {
        let root = PathBuf::from("projects").join(project.as_str());
        Self {
            project,
            interpreter: default_interpreter(),
            script_dir: root.join("src").join(project.as_str()),
            workdir: root,
            file_name: default_file_name(),
            simulated_latency_ms: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("project {0} is bound more than once")]
    Duplicate(Project),
    #[error("project {0} has an empty interpreter command")]
    EmptyInterpreter(Project),
}

#[derive(Debug, Deserialize)]
struct ProjectsJson {
    projects: Vec<ProjectBinding>,
}

/// Immutable project → binding map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    bindings: BTreeMap<Project, ProjectBinding>,
}

impl BindingTable {
    /// Build from a list of bindings, rejecting duplicates and empty commands
    pub fn from_bindings(
        bindings: impl IntoIterator<Item = ProjectBinding>,
    ) -> Result<Self, BindingError> {
        let mut map = BTreeMap::new();
        for binding in bindings {
            if binding.interpreter.is_empty() {
                return Err(BindingError::EmptyInterpreter(binding.project));
            }
            let project = binding.project;
            if map.insert(project, binding).is_some() {
                return Err(BindingError::Duplicate(project));
            }
        }
        Ok(Self { bindings: map })
    }

    /// Every project bound to its default layout
    pub fn defaults() -> Self {
        Self {
            bindings: Project::all_variants()
                .iter()
                .map(|p| (*p, ProjectBinding::default_for(*p)))
                .collect(),
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, BindingError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| BindingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: ProjectsJson =
            serde_json::from_str(&content).map_err(|source| BindingError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_bindings(parsed.projects)
    }

    /// Load the file when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, BindingError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::defaults())
        }
    }

    pub fn get(&self, project: Project) -> Option<&ProjectBinding> {
        self.bindings.get(&project)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectBinding> {
        self.bindings.values()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
