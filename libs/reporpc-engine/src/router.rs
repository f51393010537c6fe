// Project Router - project identifier → binding

use crate::error::ExecError;
use reporpc_common::{BindingTable, Project, ProjectBinding, UnknownProject};

/// Binding for `project`, or `UnknownProject` when the table leaves it unbound
pub fn route(table: &BindingTable, project: Project) -> Result<&ProjectBinding, ExecError> {
    table
        .get(project)
        .ok_or_else(|| UnknownProject(project.to_string()).into())
}
