// CLI commands: benchmark, single run, binding listing
use anyhow::{Context, Result};
use reporpc_common::{BindingTable, ExecutionRequest, ExecutionResult, Project};
use reporpc_engine::{Dispatcher, ExecutionEngine};
use std::fs;
use std::io::Write;
use std::time::{Duration, Instant};

pub const DEFAULT_CODE1: &str = "import torch\nprint(torch.__version__)";
pub const DEFAULT_CODE2: &str = "import jax\nprint(jax.__version__)";

/// Wall-clock timings of one benchmark round
#[derive(Debug, Clone, Copy)]
pub struct RoundTiming {
    pub parallel: Duration,
    pub serial: Duration,
}

#[derive(Debug)]
pub struct BenchReport {
    pub rounds: Vec<RoundTiming>,
    /// Outputs of the last round, parallel then serial
    pub parallel_outputs: Vec<ExecutionResult>,
    pub serial_outputs: Vec<ExecutionResult>,
}

fn render_outputs(results: &[ExecutionResult]) -> Vec<String> {
    results.iter().map(|r| r.stdout_lossy()).collect()
}

/// Run the fixed demonstration: the same pair in parallel, then serially, `rounds` times
pub async fn bench<E: ExecutionEngine + 'static>(
    dispatcher: &Dispatcher<E>,
    code1: &str,
    code2: &str,
    rounds: u32,
) -> Result<BenchReport> {
    let first = ExecutionRequest::new(Project::Project1, code1);
    let second = ExecutionRequest::new(Project::Project2, code2);

    let mut timings = Vec::new();
    let mut parallel_outputs = Vec::new();
    let mut serial_outputs = Vec::new();

    for round in 1..=rounds {
        tracing::info!(round, "Benchmark round");

        let start = Instant::now();
        let results = dispatcher
            .fan_out(vec![first.clone(), second.clone()])
            .await
            .into_results()
            .context("Parallel run failed")?;
        let parallel = start.elapsed();
        println!("{:?}", render_outputs(&results));
        println!("{} secs for parallel", parallel.as_secs_f64());
        parallel_outputs = results;

        let start = Instant::now();
        let (out1, out2) = dispatcher
            .serial(&first, &second)
            .await
            .context("Serial run failed")?;
        let serial = start.elapsed();
        println!("{:?}", out1.stdout_lossy());
        println!("{:?}", out2.stdout_lossy());
        println!("{} secs for serial", serial.as_secs_f64());
        serial_outputs = vec![out1, out2];

        timings.push(RoundTiming { parallel, serial });
    }

    if !timings.is_empty() {
        let n = timings.len() as f64;
        let avg_parallel = timings.iter().map(|t| t.parallel.as_secs_f64()).sum::<f64>() / n;
        let avg_serial = timings.iter().map(|t| t.serial.as_secs_f64()).sum::<f64>() / n;
        println!();
        println!("📊 {} rounds", timings.len());
        println!("  parallel avg: {:.3} secs", avg_parallel);
        println!("  serial avg:   {:.3} secs", avg_serial);
    }

    Ok(BenchReport {
        rounds: timings,
        parallel_outputs,
        serial_outputs,
    })
}

/// Source for `run`: inline code or a file
pub fn load_code(code: Option<&str>, file: Option<&str>) -> Result<String> {
    match (code, file) {
        (Some(code), None) => Ok(code.to_string()),
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
        }
        _ => anyhow::bail!("Pass exactly one of --code or --file"),
    }
}

/// Execute one request and copy its stdout bytes to `out`
pub async fn run<E: ExecutionEngine + 'static>(
    dispatcher: &Dispatcher<E>,
    project: Project,
    code: String,
    out: &mut impl Write,
) -> Result<()> {
    let request = ExecutionRequest::new(project, code);
    let result = dispatcher
        .run_one(&request)
        .await
        .with_context(|| format!("Execution on {} failed", project))?;

    out.write_all(&result.stdout)?;
    out.flush()?;
    tracing::info!(project = %project, execution_time_ms = result.execution_time_ms, "Run complete");
    Ok(())
}

/// Human-readable binding table
pub fn format_bindings(bindings: &BindingTable) -> String {
    if bindings.is_empty() {
        return "No projects bound\n".to_string();
    }

    let mut text = String::new();
    for binding in bindings.iter() {
        text.push_str(&format!("{}\n", binding.project));
        text.push_str(&format!("  interpreter: {}\n", binding.interpreter.join(" ")));
        text.push_str(&format!("  workdir:     {}\n", binding.workdir.display()));
        text.push_str(&format!(
            "  script:      {}\n",
            binding.script_dir.join(&binding.file_name).display()
        ));
        if binding.simulated_latency_ms > 0 {
            text.push_str(&format!("  latency:     {}ms\n", binding.simulated_latency_ms));
        }
    }
    text
}

pub fn list_projects(bindings: &BindingTable, json: bool) -> Result<()> {
    if json {
        let all: Vec<_> = bindings.iter().collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else {
        print!("{}", format_bindings(bindings));
    }
    Ok(())
}
