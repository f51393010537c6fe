//! Process Runner
//!
//! Launches the project's interpreter against a materialized file and
//! captures stdout. Every run has a deadline; past it the child's whole
//! process group is killed, so interpreters that fork (`uv run python`)
//! leave nothing behind.

use crate::error::ExecError;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use reporpc_common::{ExecutionResult, ProjectBinding};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// SIGKILL every process in the group led by `pgid`
fn kill_process_group(pgid: u32) {
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid, error = %e, "Failed to kill process group"),
    }
}

/// The child started but collecting its output failed
fn wait_failed(script: &Path, source: io::Error) -> ExecError {
    ExecError::Io {
        path: script.to_path_buf(),
        source,
    }
}

/// Run `script` with the binding's interpreter, in the binding's workdir
pub async fn run(
    binding: &ProjectBinding,
    script: &Path,
    timeout: Duration,
) -> Result<ExecutionResult, ExecError> {
    let (program, args) = binding
        .interpreter
        .split_first()
        .ok_or_else(|| ExecError::Launch {
            program: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty interpreter command"),
        })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(script)
        .current_dir(&binding.workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let start = Instant::now();
    let child = cmd.spawn().map_err(|source| ExecError::Launch {
        program: program.clone(),
        source,
    })?;

    // The child leads its own group: pgid == pid
    let pgid = child.id();
    tracing::debug!(
        project = %binding.project,
        program = %program,
        script = %script.display(),
        pid = pgid,
        "Spawned interpreter"
    );

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| wait_failed(script, source))?,
        Err(_) => {
            // Descendants first; dropping the wait future then kills and reaps the leader
            if let Some(pgid) = pgid {
                kill_process_group(pgid);
            }
            let timeout_ms = timeout.as_millis() as u64;
            tracing::warn!(project = %binding.project, timeout_ms, "Execution timed out, process group killed");
            return Err(ExecError::Timeout { timeout_ms });
        }
    };
    let execution_time_ms = start.elapsed().as_millis() as u64;

    if !output.status.success() {
        tracing::warn!(
            project = %binding.project,
            exit_code = output.status.code(),
            execution_time_ms,
            "Execution failed with non-zero exit"
        );
        return Err(ExecError::NonZeroExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    tracing::debug!(
        project = %binding.project,
        stdout_bytes = output.stdout.len(),
        execution_time_ms,
        "Execution completed"
    );

    Ok(ExecutionResult {
        stdout: output.stdout,
        execution_time_ms,
    })
}
