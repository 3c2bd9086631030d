//! expview CLI - inspect, chart and export ML experiment metrics
//!
//! ```bash
//! expview serve                              # Start HTTP server (port 3000)
//! expview ingest runs.csv -o runs.json       # Validate and group a CSV
//! expview chart runs.csv -e run-a -m loss    # Print chart series JSON
//! expview export runs.csv -e run-a -d out/   # Write a filtered CSV export
//! ```
//!
//! `-e` and `-m` take comma-separated lists. `chart` selects everything
//! when they are omitted; `export` with no `-m` exports every metric.

use clap::{Parser, Subcommand};
use expview::{Config, ExperimentSession, IngestSource};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "expview")]
#[command(about = "Validate, select and export ML experiment metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV and output the grouped experiments as JSON
    Ingest {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print chart series for a selection
    Chart {
        /// Input CSV file
        input: PathBuf,

        /// Experiment ids (default: all)
        #[arg(short, long, value_delimiter = ',')]
        experiments: Vec<String>,

        /// Metric names (default: all available)
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the selected rows as CSV
    Export {
        /// Input CSV file
        input: PathBuf,

        /// Experiment ids (default: all)
        #[arg(short, long, value_delimiter = ',')]
        experiments: Vec<String>,

        /// Metric names (default: every metric)
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<String>,

        /// Output directory
        #[arg(short = 'd', long, default_value = ".")]
        dir: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: EXPVIEW_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Session store directory (default: EXPVIEW_SESSION_DIR)
        #[arg(long)]
        session_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest { input, output } => cmd_ingest(&input, output.as_deref()).await,

        Commands::Chart {
            input,
            experiments,
            metrics,
            output,
        } => cmd_chart(&input, &experiments, &metrics, output.as_deref()).await,

        Commands::Export {
            input,
            experiments,
            metrics,
            dir,
        } => cmd_export(&input, &experiments, &metrics, &dir).await,

        Commands::Serve { port, session_dir } => cmd_serve(port, session_dir).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Ingest `input` into a fresh session, failing on any ingestion error.
async fn load(input: &Path) -> Result<ExperimentSession, Box<dyn std::error::Error>> {
    let mut session = ExperimentSession::new();
    let outcome = session.ingest(IngestSource::path(input)).await;

    if !outcome.success {
        let error = outcome
            .error
            .unwrap_or_else(|| "Unknown error occurred".to_string());
        return Err(error.into());
    }
    Ok(session)
}

/// Apply `-e` / `-m` lists on a fresh selection. Empty experiment list
/// selects them all. Repeated names count once.
fn select(session: &mut ExperimentSession, experiments: &[String], metrics: &[String]) {
    if experiments.is_empty() {
        session.select_all_experiments();
    } else {
        session.clear_experiment_selection();
        let unique: BTreeSet<&String> = experiments.iter().collect();
        for id in unique {
            session.toggle_experiment(id);
        }
    }

    let unique: BTreeSet<&String> = metrics.iter().collect();
    for name in unique {
        session.toggle_metric(name);
    }
}

async fn cmd_ingest(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());
    let session = load(input).await?;

    eprintln!("\n📊 Experiments:");
    for summary in session.experiment_summaries() {
        eprintln!(
            "   {} - {} points, metrics: {}",
            summary.id,
            summary.data_points,
            summary.metrics.join(", ")
        );
    }

    let json = serde_json::to_string_pretty(session.experiments())?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

async fn cmd_chart(
    input: &Path,
    experiments: &[String],
    metrics: &[String],
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = load(input).await?;
    select(&mut session, experiments, metrics);
    if metrics.is_empty() {
        session.select_all_metrics();
    }

    let series = session.chart_series();
    eprintln!("📈 {} series", series.len());

    let json = serde_json::to_string_pretty(&series)?;
    write_output(&json, output)?;
    Ok(())
}

async fn cmd_export(
    input: &Path,
    experiments: &[String],
    metrics: &[String],
    dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = load(input).await?;
    select(&mut session, experiments, metrics);

    match session.export_selected_data() {
        Some(artifact) => {
            let path = artifact.write_to_dir(dir)?;
            eprintln!("💾 {} rows written to: {}", artifact.row_count, path.display());
        }
        None => {
            eprintln!("⚠️  Nothing to export for this selection");
        }
    }
    Ok(())
}

async fn cmd_serve(
    port: Option<u16>,
    session_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()
        .with_port(port)
        .with_session_dir(session_dir);
    expview::server::start_server(config).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
