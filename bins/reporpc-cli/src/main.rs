mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reporpc_common::{BindingTable, Config, Project};
use reporpc_engine::Dispatcher;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "reporpc-cli")]
#[command(about = "reporpc CLI - Run code against project environments and benchmark dispatch", long_about = None)]
struct Cli {
    /// Project binding file (defaults to PROJECTS_CONFIG_PATH or config/projects.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Per-request deadline in milliseconds (clamped to MAX_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time the same pair of requests in parallel and serially
    Bench {
        /// Number of parallel/serial rounds
        #[arg(short, long, default_value = "2")]
        rounds: u32,

        /// Code for project1
        #[arg(long, default_value = commands::DEFAULT_CODE1)]
        code1: String,

        /// Code for project2
        #[arg(long, default_value = commands::DEFAULT_CODE2)]
        code2: String,
    },

    /// Execute one piece of code and print its stdout
    Run {
        /// Target project (project1, project2)
        #[arg(short, long)]
        project: Project,

        /// Inline source code
        #[arg(short, long)]
        code: Option<String>,

        /// Read source code from a file
        #[arg(short, long)]
        file: Option<String>,
    },

    /// List the configured project bindings
    ListProjects {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config.projects_config_path.clone());
    let bindings = BindingTable::load_or_default(&config_path)
        .with_context(|| format!("Failed to load project bindings from {}", config_path))?;

    let timeout = Duration::from_millis(config.effective_timeout_ms(cli.timeout_ms));
    let dispatcher = Dispatcher::new(bindings).with_timeout(timeout);

    match cli.command {
        Commands::Bench {
            rounds,
            code1,
            code2,
        } => {
            commands::bench(&dispatcher, &code1, &code2, rounds).await?;
        }
        Commands::Run {
            project,
            code,
            file,
        } => {
            let code = commands::load_code(code.as_deref(), file.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            commands::run(&dispatcher, project, code, &mut stdout).await?;
        }
        Commands::ListProjects { json } => {
            commands::list_projects(dispatcher.bindings(), json)?;
        }
    }

    Ok(())
}
