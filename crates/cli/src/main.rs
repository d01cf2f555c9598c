//! OIS Workbench CLI - drive an OIS simulation project from the terminal
//! Refresh dependencies, run the simulation, export, and inspect project status.

mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use workbench_core::application::{
    BroadcastListener, DependencyReport, FanoutListener, ProjectContext, TracingListener,
};
use workbench_core::domain::{
    CommandSpec, Operation, OperationKind, OperationOutcome, OperationStatus, ProgressEvent,
};
use workbench_core::port::id_provider::UuidProvider;
use workbench_core::port::time_provider::SystemTimeProvider;
use workbench_core::port::{CommandRunner, OperationEvent};
use workbench_core::WorkbenchConfig;
use workbench_infra_system::SubprocessExecutor;

const EVENT_BUFFER: usize = 256;

#[derive(Parser)]
#[command(name = "ois-workbench")]
#[command(about = "OIS simulation project workbench", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory
    #[arg(long, env = "OIS_PROJECT", default_value = ".")]
    project: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, download and install the plugin and core dependencies
    Refresh {
        /// Install into the local registry even when already present
        #[arg(long)]
        force: bool,
    },

    /// Run the simulation in debug mode
    Run,

    /// Run the simulation with a scratch dev-mode directory
    DevMode,

    /// Build the distribution into build/ois/distribution
    Export,

    /// Show project and dependency status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one command in the project directory through the process engine
    Exec {
        /// Timeout in seconds (default: OIS_COMMAND_TIMEOUT_MINS)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Command line, e.g. `exec -- git status`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Tabled)]
struct DependencyRow {
    dependency: String,
    version: String,
    cached: String,
    installed: String,
}

impl From<&DependencyReport> for DependencyRow {
    fn from(report: &DependencyReport) -> Self {
        Self {
            dependency: report.kind.to_string(),
            version: report
                .version
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unresolved".to_string()),
            cached: yes_no(report.cached),
            installed: yes_no(report.installed),
        }
    }
}

#[derive(Serialize)]
struct StatusReport<'a> {
    project: String,
    name: &'a str,
    is_ois_project: bool,
    dependencies: &'a [DependencyReport],
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Keep the file writer guard alive until exit
    let _log_guard = logging::init()?;

    let config = Arc::new(config::load()?);
    let project_dir = std::fs::canonicalize(&cli.project)
        .with_context(|| format!("Project directory not found: {}", cli.project.display()))?;

    info!(
        project = %project_dir.display(),
        home = %config.home_dir.display(),
        version = workbench_core::VERSION,
        "OIS workbench starting"
    );

    let executor: Arc<dyn CommandRunner> =
        Arc::new(SubprocessExecutor::new(Arc::new(SystemTimeProvider)));

    let events = Arc::new(BroadcastListener::new(EVENT_BUFFER));
    let listener = FanoutListener::new()
        .with(Arc::new(TracingListener))
        .with(events.clone());
    let context = ProjectContext::new(
        project_dir.clone(),
        Arc::clone(&config),
        Arc::clone(&executor),
        Arc::new(listener),
        Arc::new(UuidProvider),
    );

    let operation = match cli.command {
        Commands::Refresh { force } => Operation::Refresh {
            force_install: force,
        },
        Commands::Run => Operation::Run,
        Commands::DevMode => Operation::DevMode,
        Commands::Export => Operation::Export,
        Commands::Status { json } => return status(&context, json),
        Commands::Exec {
            timeout_secs,
            command,
        } => return exec(executor, &config, project_dir, timeout_secs, command).await,
    };

    let outcome = run_operation(&context, &events, operation).await?;
    Ok(match outcome {
        Some(OperationOutcome::Succeeded) => {
            if operation == Operation::Export {
                println!(
                    "  {} {}",
                    "Distribution:".bold(),
                    context.distribution_dir().display()
                );
            }
            ExitCode::SUCCESS
        }
        Some(OperationOutcome::Cancelled) => ExitCode::from(130),
        Some(OperationOutcome::Failed) | None => ExitCode::FAILURE,
    })
}

/// Start one operation and follow it to the end (`None` when nothing started).
/// Ctrl-C cancels it and stops the running simulation process, if any.
async fn run_operation(
    context: &ProjectContext,
    events: &BroadcastListener,
    operation: Operation,
) -> Result<Option<OperationOutcome>> {
    let kind = operation.kind();
    let printer = tokio::spawn(print_progress(events.subscribe(), kind));

    let Some(handle) = context.start(operation)? else {
        printer.abort();
        println!(
            "{}",
            format!(
                "Nothing started: {} is already running or {} is not an OIS project",
                kind,
                context.project_dir().display()
            )
            .yellow()
        );
        return Ok(None);
    };

    println!(
        "{} {}",
        operation.title().cyan().bold(),
        format!("({})", handle.run_id()).dimmed()
    );

    let canceller = handle.canceller();
    let wait = handle.wait();
    tokio::pin!(wait);

    let outcome = tokio::select! {
        outcome = &mut wait => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Cancelling...".yellow());
            canceller.cancel();
            if kind == OperationKind::Simulation {
                if let Err(e) = context.stop_simulation().await {
                    warn!(error = %e, "Failed to stop the simulation process");
                }
            }
            wait.await
        }
    };

    // Ended is published before the outcome, so the printer has seen it
    if let Err(e) = printer.await {
        warn!(error = %e, "Progress printer failed");
    }

    match outcome {
        OperationOutcome::Succeeded => println!("{}", format!("✓ {}", kind).green().bold()),
        OperationOutcome::Cancelled => {
            println!("{}", format!("○ {} cancelled", kind).yellow().bold())
        }
        OperationOutcome::Failed => {
            println!("{}", format!("✗ {} failed (see log)", kind).red().bold())
        }
    }

    Ok(Some(outcome))
}

async fn print_progress(mut events: broadcast::Receiver<OperationEvent>, kind: OperationKind) {
    loop {
        match events.recv().await {
            Ok(OperationEvent::Progress {
                kind: event_kind,
                progress,
                ..
            }) if event_kind == kind => match progress {
                ProgressEvent::Update { message, fraction } => match fraction {
                    Some(fraction) => {
                        println!("  [{:>3.0}%] {}", fraction * 100.0, message)
                    }
                    None => println!("  [ .. ] {}", message),
                },
                ProgressEvent::Done => println!("  [100%] {}", "done".green()),
                ProgressEvent::Cancelled => println!("  [ -- ] {}", "stopped".yellow()),
            },
            Ok(OperationEvent::Ended {
                kind: event_kind, ..
            }) if event_kind == kind => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn status(context: &ProjectContext, json: bool) -> Result<ExitCode> {
    let is_ois_project = context.is_simulation_project();
    let dependencies = if is_ois_project {
        context.dependency_report()?
    } else {
        Vec::new()
    };

    if json {
        let report = StatusReport {
            project: context.project_dir().display().to_string(),
            name: context.name(),
            is_ois_project,
            dependencies: &dependencies,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Project Status".cyan().bold());
    println!();
    println!("  {} {}", "Project:".bold(), context.project_dir().display());
    println!("  {} {}", "Name:".bold(), context.name());

    if !is_ois_project {
        println!("  {} {}", "OIS Project:".bold(), "NO".red());
        return Ok(ExitCode::SUCCESS);
    }
    println!("  {} {}", "OIS Project:".bold(), "YES".green());

    for kind in OperationKind::ALL {
        let state = match context.status(kind) {
            OperationStatus::Idle => "IDLE".normal(),
            OperationStatus::Running => "RUNNING".green(),
        };
        println!("  {} {}", format!("{}:", kind).bold(), state);
    }
    println!();

    let rows: Vec<DependencyRow> = dependencies.iter().map(DependencyRow::from).collect();
    println!("{}", Table::new(rows));

    Ok(ExitCode::SUCCESS)
}

async fn exec(
    executor: Arc<dyn CommandRunner>,
    config: &WorkbenchConfig,
    project_dir: PathBuf,
    timeout_secs: Option<u64>,
    command: Vec<String>,
) -> Result<ExitCode> {
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(config.command_timeout);

    // Blank executable: the first argument is the program
    let spec = CommandSpec::builder("")
        .args(command)
        .working_dir(project_dir)
        .timeout(timeout)
        .build();

    let result = executor
        .execute(&spec)
        .await
        .with_context(|| format!("Failed to run '{}'", spec.display_line()))?;

    print!("{}", result.stdout);
    eprint!("{}", result.stderr);

    if result.timed_out {
        eprintln!("{}", format!("✗ timed out after {:?}", timeout).red());
    }

    Ok(ExitCode::from(result.exit_code.clamp(0, 255) as u8))
}
