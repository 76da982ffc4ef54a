//! schema-refresh CLI - refresh a schema from its higher environment.

use clap::{Parser, Subcommand};
use schema_refresh::{Config, RefreshError, ReplicationOrchestrator, RunOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "schema-refresh")]
#[command(about = "Refresh a schema's partitions, tables and materialized views from a source schema")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full refresh
    Run {
        /// Override number of concurrent table syncs
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show what a refresh would do, without changing anything
    Plan,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, RefreshError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format).map_err(RefreshError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { workers } => {
            if let Some(w) = workers {
                config.refresh.workers = Some(w);
                config.validate()?;
            }

            // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
            let cancel_token = setup_signal_handler();

            let orchestrator = ReplicationOrchestrator::from_config(&config).await?;
            let result = orchestrator.run(Some(cancel_token)).await;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                match &result.report {
                    Some(report) => {
                        println!("\n{}", report.subject);
                        print!("{}", report.body);
                    }
                    None => {
                        println!("\nRefresh {} aborted in phase {}", result.run_id, result.phase);
                        if let Some(ref fatal) = result.fatal {
                            println!("  Error: {}", fatal);
                        }
                    }
                }
                println!("  Run ID: {}", result.run_id);
                println!(
                    "  Duration: {:.2}s",
                    (result.completed_at - result.started_at).num_milliseconds() as f64 / 1000.0
                );
            }

            if let RunOutcome::FatalFailure = result.outcome {
                eprintln!("Refresh aborted; foreign keys on target may still be disabled");
            }
            Ok(result.exit_code())
        }

        Commands::Plan => {
            let orchestrator = ReplicationOrchestrator::from_config(&config).await?;
            let plan = orchestrator.plan().await?;

            if cli.output_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&plan).map_err(RefreshError::from)?
                );
            } else {
                println!("\nRefresh plan for {}:", config.target_name());
                println!("  Tables to reload: {}", plan.tables.len());
                for table in &plan.tables {
                    println!("    {}", table.name);
                }
                println!("  Foreign keys to toggle: {}", plan.constraints.len());
                println!("  Partitions to drop: {}", plan.partitions.drops.len());
                for p in &plan.partitions.drops {
                    println!("    {}.{}", p.table_name, p.partition_name);
                }
                println!("  Partitions to add: {}", plan.partitions.adds.len());
                for p in &plan.partitions.adds {
                    println!(
                        "    {}.{} {}",
                        p.table_name,
                        p.partition_name,
                        p.high_value.values_clause()
                    );
                }
                println!("  Materialized views to refresh: {}", plan.views.len());
            }
            Ok(0)
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Tables not yet started are recorded as cancelled; foreign keys are still re-enabled.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Finishing running tables, then re-enabling constraints...", name);
                    token.cancel();
                }
                Err(e) => eprintln!("Failed to setup {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing running tables, then re-enabling constraints...");
            token.cancel();
        }
    });

    cancel_token
}
