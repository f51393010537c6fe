//! Execution Engine - Abstraction for Code Execution
//!
//! **Core Responsibility:**
//! Run one piece of submitted code in a project's environment and return
//! its raw stdout.
//!
//! **Architectural Boundary:**
//! - Engine knows HOW to execute (local subprocess, container, remote, ...)
//! - Engine does NOT know about batches or ordering
//! - Dispatcher owns fan-out and result collection
//!
//! ProcessEngine is the production backend. Tests plug in scripted engines.

use crate::error::ExecError;
use crate::{materializer, runner};
use async_trait::async_trait;
use reporpc_common::{ExecutionResult, ProjectBinding};
use std::time::Duration;

/// Execution engine trait
///
/// Any implementation must guarantee:
/// 1. Run `code` in the environment `binding` describes
/// 2. Respect `timeout`
/// 3. Return stdout unchanged on success
/// 4. Report non-zero exits as errors, never as empty output
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(
        &self,
        binding: &ProjectBinding,
        code: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError>;
}

/// Materialize to a per-request file, then run the interpreter on it
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEngine;

impl ProcessEngine {
    pub fn new() -> Self {
        ProcessEngine
    }
}

#[async_trait]
impl ExecutionEngine for ProcessEngine {
    async fn execute(
        &self,
        binding: &ProjectBinding,
        code: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        if binding.simulated_latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(binding.simulated_latency_ms)).await;
        }

        let file = materializer::materialize_for(binding, code).await?;
        runner::run(binding, file.path(), timeout).await
    }
}
