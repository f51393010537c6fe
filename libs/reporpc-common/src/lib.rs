pub mod types;
pub mod bindings;
pub mod config;

// Re-export commonly used types for convenience
pub use bindings::{BindingError, BindingTable, ProjectBinding};
pub use config::Config;
pub use types::{ExecutionRequest, ExecutionResult, Project, UnknownProject};
