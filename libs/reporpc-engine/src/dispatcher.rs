//! Dispatchers - fan-out and serial execution of requests
//!
//! The fan-out path spawns one task per request and joins them in
//! request order, so outputs[i] always belongs to requests[i] whatever
//! the completion order. Every outcome is kept; nothing is dropped on
//! the first failure.

use crate::engine::{ExecutionEngine, ProcessEngine};
use crate::error::{BatchOutcome, ExecError, RequestOutcome};
use crate::router;
use futures_util::future::join_all;
use reporpc_common::{BindingTable, ExecutionRequest, ExecutionResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Dispatcher<E = ProcessEngine> {
    engine: Arc<E>,
    bindings: Arc<BindingTable>,
    timeout: Duration,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            bindings: Arc::clone(&self.bindings),
            timeout: self.timeout,
        }
    }
}

impl Dispatcher<ProcessEngine> {
    pub fn new(bindings: BindingTable) -> Self {
        Self::with_engine(ProcessEngine::new(), bindings)
    }
}

impl<E: ExecutionEngine + 'static> Dispatcher<E> {
    pub fn with_engine(engine: E, bindings: BindingTable) -> Self {
        Self {
            engine: Arc::new(engine),
            bindings: Arc::new(bindings),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Route and execute a single request on the calling task
    pub async fn run_one(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError> {
        let binding = router::route(&self.bindings, request.project)?;
        self.engine.execute(binding, &request.code, self.timeout).await
    }

    /// Execute every request concurrently; outcomes come back in request order
    pub async fn fan_out(&self, requests: Vec<ExecutionRequest>) -> BatchOutcome {
        let start = Instant::now();
        let total = requests.len();
        tracing::info!(requests = total, "Dispatching batch");

        let tasks = requests.into_iter().enumerate().map(|(index, request)| {
            let project = request.project;
            // Unbound projects fail here, before any file write or launch
            let routed = router::route(&self.bindings, project).cloned();
            let engine = Arc::clone(&self.engine);
            let timeout = self.timeout;

            async move {
                let result = match routed {
                    Ok(binding) => {
                        let handle = tokio::spawn(async move {
                            engine.execute(&binding, &request.code, timeout).await
                        });
                        match handle.await {
                            Ok(result) => result,
                            Err(e) => Err(ExecError::TaskFailed(e.to_string())),
                        }
                    }
                    Err(e) => Err(e),
                };

                if let Err(e) = &result {
                    tracing::warn!(index, project = %project, kind = e.kind(), error = %e, "Request failed");
                }

                RequestOutcome {
                    index,
                    project,
                    result,
                }
            }
        });

        let outcomes = join_all(tasks).await;
        let batch = BatchOutcome { outcomes };

        tracing::info!(
            requests = total,
            failed = batch.outcomes.iter().filter(|o| o.result.is_err()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch complete"
        );

        batch
    }

    /// Run `first` to completion, then `second`.
    /// A failure of `first` stops the sequence; `second` never starts.
    pub async fn serial(
        &self,
        first: &ExecutionRequest,
        second: &ExecutionRequest,
    ) -> Result<(ExecutionResult, ExecutionResult), ExecError> {
        let first = self.run_one(first).await?;
        let second = self.run_one(second).await?;
        Ok((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reporpc_common::{Project, ProjectBinding};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Test engine driven by the code string:
    /// `"<delay_ms>:<stdout>"`, `"fail:<code>"` or `"panic"`
    #[derive(Default)]
    struct ScriptedEngine {
        calls: AtomicUsize,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExecutionEngine for ScriptedEngine {
        async fn execute(
            &self,
            binding: &ProjectBinding,
            code: &str,
            _timeout: Duration,
        ) -> Result<ExecutionResult, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(format!("start {}", code));

            if code == "panic" {
                panic!("engine blew up");
            }
            if let Some(exit) = code.strip_prefix("fail:") {
                self.events.lock().unwrap().push(format!("end {}", code));
                return Err(ExecError::NonZeroExit {
                    code: exit.parse().ok(),
                    stderr: format!("{} failed\n", binding.project),
                });
            }

            let (delay, out) = code.split_once(':').unwrap();
            tokio::time::sleep(Duration::from_millis(delay.parse().unwrap())).await;
            self.events.lock().unwrap().push(format!("end {}", code));

            Ok(ExecutionResult {
                stdout: format!("{}:{}\n", binding.project, out).into_bytes(),
                execution_time_ms: 0,
            })
        }
    }

    fn req(project: Project, code: &str) -> ExecutionRequest {
        ExecutionRequest::new(project, code)
    }

    fn stdouts(results: &[ExecutionResult]) -> Vec<String> {
        results.iter().map(|r| r.stdout_lossy()).collect()
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let dispatcher = Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());

        // Later requests finish first
        let outcome = dispatcher
            .fan_out(vec![
                req(Project::Project1, "90:a"),
                req(Project::Project2, "10:b"),
                req(Project::Project1, "50:c"),
                req(Project::Project2, "0:d"),
            ])
            .await;

        let results = outcome.into_results().unwrap();
        assert_eq!(
            stdouts(&results),
            vec!["project1:a\n", "project2:b\n", "project1:c\n", "project2:d\n"]
        );
    }

    #[tokio::test]
    async fn test_fan_out_order_for_every_completion_permutation() {
        let delays = [[0, 20, 40], [0, 40, 20], [20, 0, 40], [20, 40, 0], [40, 0, 20], [40, 20, 0]];

        for perm in delays {
            let dispatcher =
                Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());
            let requests = perm
                .iter()
                .enumerate()
                .map(|(i, d)| req(Project::Project1, &format!("{}:{}", d, i)))
                .collect();

            let results = dispatcher.fan_out(requests).await.into_results().unwrap();
            assert_eq!(results.len(), 3);
            assert_eq!(
                stdouts(&results),
                vec!["project1:0\n", "project1:1\n", "project1:2\n"]
            );
        }
    }

    #[tokio::test]
    async fn test_fan_out_runs_concurrently() {
        let dispatcher = Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());
        let requests = (0..5).map(|i| req(Project::Project1, &format!("200:{}", i))).collect();

        let start = Instant::now();
        let results = dispatcher.fan_out(requests).await.into_results().unwrap();

        assert_eq!(results.len(), 5);
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_fan_out_collects_all_failures() {
        let dispatcher = Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());

        let err = dispatcher
            .fan_out(vec![
                req(Project::Project1, "0:ok"),
                req(Project::Project2, "fail:2"),
                req(Project::Project1, "30:also-ok"),
                req(Project::Project2, "fail:5"),
            ])
            .await
            .into_results()
            .unwrap_err();

        assert_eq!(err.outcomes.len(), 4);
        assert_eq!(
            err.outcomes[0].result.as_ref().unwrap().stdout_lossy(),
            "project1:ok\n"
        );
        assert_eq!(
            err.outcomes[2].result.as_ref().unwrap().stdout_lossy(),
            "project1:also-ok\n"
        );
        let codes: Vec<_> = err.failures().map(|(i, e)| (i, e.exit_code())).collect();
        assert_eq!(codes, vec![(1, Some(2)), (3, Some(5))]);
    }

    #[tokio::test]
    async fn test_fan_out_panicking_task_reported_in_place() {
        let dispatcher = Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());

        let outcome = dispatcher
            .fan_out(vec![req(Project::Project1, "0:x"), req(Project::Project2, "panic")])
            .await;

        assert!(outcome.outcomes[0].result.is_ok());
        let err = outcome.outcomes[1].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), "task_failed");
    }

    #[tokio::test]
    async fn test_unbound_project_never_reaches_engine() {
        let table =
            BindingTable::from_bindings(vec![ProjectBinding::default_for(Project::Project1)])
                .unwrap();
        let engine = ScriptedEngine::default();
        let dispatcher = Dispatcher::with_engine(engine, table);

        let outcome = dispatcher
            .fan_out(vec![req(Project::Project2, "0:never"), req(Project::Project1, "0:yes")])
            .await;

        assert_eq!(outcome.outcomes[0].result.as_ref().unwrap_err().kind(), "unknown_project");
        assert!(outcome.outcomes[1].result.is_ok());
        assert_eq!(dispatcher.engine.calls.load(Ordering::SeqCst), 1);

        let err = dispatcher.run_one(&req(Project::Project2, "0:never")).await.unwrap_err();
        assert_eq!(err.kind(), "unknown_project");
        assert_eq!(dispatcher.engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dispatcher = Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());
        let outcome = dispatcher.fan_out(vec![]).await;
        assert!(outcome.outcomes.is_empty());
        assert!(outcome.into_results().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serial_never_interleaves() {
        let dispatcher = Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());

        // First is slower; a concurrent run would finish second first
        let (a, b) = dispatcher
            .serial(&req(Project::Project1, "80:first"), &req(Project::Project2, "0:second"))
            .await
            .unwrap();

        assert_eq!(a.stdout_lossy(), "project1:first\n");
        assert_eq!(b.stdout_lossy(), "project2:second\n");
        assert_eq!(
            *dispatcher.engine.events.lock().unwrap(),
            vec!["start 80:first", "end 80:first", "start 0:second", "end 0:second"]
        );
    }

    #[tokio::test]
    async fn test_serial_stops_on_first_failure() {
        let dispatcher = Dispatcher::with_engine(ScriptedEngine::default(), BindingTable::defaults());

        let err = dispatcher
            .serial(&req(Project::Project1, "fail:1"), &req(Project::Project2, "0:second"))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(dispatcher.engine.calls.load(Ordering::SeqCst), 1);
    }

    fn sh_table(root: &Path) -> BindingTable {
        let bindings = Project::all_variants().iter().map(|p| {
            let dir = root.join(p.as_str());
            std::fs::create_dir_all(&dir).unwrap();
            ProjectBinding {
                project: *p,
                interpreter: vec!["sh".to_string()],
                workdir: dir.clone(),
                script_dir: dir,
                file_name: "run.sh".to_string(),
                simulated_latency_ms: 0,
            }
        });
        BindingTable::from_bindings(bindings).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_same_project_requests_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let dispatcher =
            Dispatcher::new(sh_table(root.path())).with_timeout(Duration::from_secs(20));

        // Each body sleeps before echoing, so all files coexist on disk
        let requests = (0..8)
            .map(|i| req(Project::Project1, &format!("sleep 0.2\necho request-{}", i)))
            .collect();

        let results = dispatcher.fan_out(requests).await.into_results().unwrap();
        let expected: Vec<String> = (0..8).map(|i| format!("request-{}\n", i)).collect();
        assert_eq!(stdouts(&results), expected);

        let leftover = std::fs::read_dir(root.path().join("project1")).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_fan_out_with_processes_reports_exit_code() {
        let root = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(sh_table(root.path()));

        let err = dispatcher
            .fan_out(vec![
                req(Project::Project1, "echo 2.3.0"),
                req(Project::Project2, "echo broken >&2; exit 42"),
            ])
            .await
            .into_results()
            .unwrap_err();

        assert_eq!(err.outcomes[0].result.as_ref().unwrap().stdout, b"2.3.0\n");
        match &err.outcomes[1].result {
            Err(ExecError::NonZeroExit { code, stderr }) => {
                assert_eq!(*code, Some(42));
                assert_eq!(stderr, "broken\n");
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fan_out_timeout_per_request() {
        let root = tempfile::tempdir().unwrap();
        let dispatcher =
            Dispatcher::new(sh_table(root.path())).with_timeout(Duration::from_millis(300));

        let outcome = dispatcher
            .fan_out(vec![
                req(Project::Project1, "sleep 30"),
                req(Project::Project2, "echo quick"),
            ])
            .await;

        assert_eq!(outcome.outcomes[0].result.as_ref().unwrap_err().kind(), "timeout");
        assert_eq!(outcome.outcomes[1].result.as_ref().unwrap().stdout, b"quick\n");
    }
}
