//! pg-npy-export CLI - export PostgreSQL tables as NumPy column arrays.

use clap::{Parser, Subcommand};
use pg_npy_export::{health_check, Config, ExportError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "pg-npy-export")]
#[command(about = "Export PostgreSQL tables as per-column NumPy arrays")]
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
    /// Export the selected tables
    Run {
        /// Override the table selection (comma separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,

        /// Override rows fetched per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Dry run: discover the schema and show the plan without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the schema description of the selected tables
    Discover {
        /// Override the table selection (comma separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::read(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            tables,
            page_size,
            output_dir,
            dry_run,
        } => {
            if let Some(tables) = tables {
                config.export.tables = tables;
            }
            if let Some(n) = page_size {
                config.export.page_size = n;
            }
            if let Some(dir) = output_dir {
                config.export.output_dir = dir;
            }
            config.validate()?;

            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(dry_run).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = if dry_run { "Dry run completed!" } else { "Export completed!" };
                println!("\n{}", status_msg);
                println!("  Dataset: {}", result.dataset_name);
                println!("  Output: {}", result.output_dir.display());
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Tables: {}", result.tables_total);
                println!("  Rows: {}", result.rows_exported);
                println!("  Columns written: {}", result.columns_written);
                if result.conversion_warnings > 0 {
                    println!("  Conversion warnings: {}", result.conversion_warnings);
                }
            }
        }

        Commands::Discover { tables } => {
            if let Some(tables) = tables {
                config.export.tables = tables;
            }
            config.validate()?;

            let orchestrator = Orchestrator::new(config).await?;
            let schema = orchestrator.discover().await?;
            println!("{}", schema.to_json()?);
        }

        Commands::HealthCheck => {
            config.validate()?;

            let result = health_check(&config.source).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (PostgreSQL): {} ({}ms)",
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(ExportError::connection(
                    "health check failed",
                    "SELECT 1",
                ));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries results (JSON, schema); logs go to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
