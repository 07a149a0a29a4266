#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arlo::gateway::{ProviderGateway, TracingUsageSink};
use arlo::matrix::ScoringMatrix;
use arlo::optimizer::{optimize, OptimizerMode, Weights};
use arlo::weights::{normalize, parse_weight_list};
use arlo::{render_report, AnalysisConfig, Architect, Concern};

#[derive(Parser)]
#[command(name = "arlo", version, about = "Architectural pattern selection from requirements")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a requirements file (LLM calls)
    Analyze {
        /// Newline-separated requirements
        #[arg(long)]
        input: PathBuf,
        /// Scoring matrix (TSV or CSV); defaults to the bundled table
        #[arg(long)]
        matrix: Option<PathBuf>,
        /// AnalysisConfig JSON
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides the optimizer in the config
        #[arg(long, value_enum)]
        mode: Option<CliOptimizerMode>,
        /// Strict ASR selection
        #[arg(long)]
        strict: bool,
        /// Output outcome JSON
        #[arg(long)]
        out: PathBuf,
        /// Also write the plain-text report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Select patterns for explicit quality weights (offline)
    Optimize {
        #[arg(long)]
        matrix: Option<PathBuf>,
        /// Comma-separated "Quality:weight" pairs, names or two-letter codes
        #[arg(long)]
        weights: String,
        #[arg(long, value_enum, default_value = "ilp")]
        mode: CliOptimizerMode,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the categories, patterns and columns of a scoring matrix
    Matrix {
        #[arg(long)]
        matrix: Option<PathBuf>,
    },
}

/// CLI-facing optimizer mode (clap::ValueEnum).
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOptimizerMode {
    Ilp,
    Greedy,
}

impl From<CliOptimizerMode> for OptimizerMode {
    fn from(m: CliOptimizerMode) -> Self {
        match m {
            CliOptimizerMode::Ilp => OptimizerMode::Ilp,
            CliOptimizerMode::Greedy => OptimizerMode::Greedy,
        }
    }
}

#[derive(Serialize)]
struct OptimizeOutput {
    mode: OptimizerMode,
    concern: Concern,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            matrix,
            config,
            mode,
            strict,
            out,
            report,
        } => {
            let mut config = match config {
                Some(path) => AnalysisConfig::from_json_file(path)?,
                None => AnalysisConfig::default(),
            };
            if let Some(mode) = mode {
                config.optimizer = mode.into();
            }
            if strict {
                config.strict_asr_selection = true;
            }

            let text = std::fs::read_to_string(&input)?;
            let matrix = Arc::new(load_matrix(matrix.as_ref())?);
            let gateway = Arc::new(ProviderGateway::from_env(Arc::new(TracingUsageSink))?);
            if !gateway.adapter().health_check().await {
                tracing::warn!("ollama server did not answer its health check; continuing");
            }

            let architect = Architect::new(matrix, gateway.clone(), gateway, config);
            let outcome = architect.analyze(&text).await?;
            write_json(&out, &outcome)?;
            info!(run_id = %outcome.run_id, concerns = outcome.concerns.len(), out = %out.display(), "analysis written");

            if let Some(path) = report {
                std::fs::write(&path, render_report(&outcome))?;
            }
        }
        Commands::Optimize {
            matrix,
            weights,
            mode,
            out,
        } => {
            let matrix = load_matrix(matrix.as_ref())?;
            let weights: Weights = parse_weight_list(&weights)?;
            let normalized = normalize(&weights);
            let desired: Vec<String> = weights.keys().cloned().collect();
            let mode = OptimizerMode::from(mode);

            let selection = optimize(mode, &matrix, &desired, &normalized, None)?;
            let concern = Concern::new(Vec::new(), weights, normalized, selection);
            info!(status = ?concern.status, total = concern.total_score, "optimization done");
            write_json(&out, &OptimizeOutput { mode, concern })?;
        }
        Commands::Matrix { matrix } => {
            let matrix = load_matrix(matrix.as_ref())?;
            println!("Columns: {}", matrix.columns().join(", "));
            for category in matrix.categories() {
                println!("\n{category}:");
                for row in matrix.patterns_in(category) {
                    let scores: Vec<String> = row
                        .scores
                        .iter()
                        .map(|(q, s)| format!("{q}={s}"))
                        .collect();
                    println!("  {}  [{}]", row.name, scores.join(", "));
                }
            }
        }
    }

    Ok(())
}

fn load_matrix(path: Option<&PathBuf>) -> Result<ScoringMatrix, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => ScoringMatrix::load(path)?,
        None => ScoringMatrix::bundled()?,
    })
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
