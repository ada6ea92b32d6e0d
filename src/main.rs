mod config;
mod workflow;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use somasieve_io::VariantClass;

use crate::config::PipelineConfig;
use crate::workflow::{CallOutcome, EvaluateOutcome, EvaluateRequest, TrainOutcome};

#[derive(Parser)]
#[command(name = "somasieve")]
#[command(about = "Somatic variant candidate scoring, threshold calibration and call filtering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pipeline configuration (JSON)
    #[arg(long, global = true, default_value = "somasieve.json")]
    config: PathBuf,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Variant classes a workflow runs on.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassArg {
    Snv,
    Indel,
    Both,
}

impl ClassArg {
    fn classes(self) -> Vec<VariantClass> {
        match self {
            Self::Snv => vec![VariantClass::Snv],
            Self::Indel => vec![VariantClass::Indel],
            Self::Both => vec![VariantClass::Snv, VariantClass::Indel],
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Fit, persist and calibrate the models of one or more model sets
    Train {
        /// Model set names from the config (all sets when omitted)
        #[arg(long = "model-set")]
        model_sets: Vec<String>,

        /// Variant classes to train
        #[arg(long, value_enum, default_value_t = ClassArg::Both)]
        class: ClassArg,
    },

    /// Call somatic variants for the samples of a sample sheet
    Call {
        /// Header-less sample sheet: sample, unused, replicate, candidate table
        #[arg(long)]
        sheet: PathBuf,

        /// Variant classes to call
        #[arg(long, value_enum, default_value_t = ClassArg::Both)]
        class: ClassArg,
    },

    /// Reconcile an external score table with labels and report metrics
    Evaluate {
        /// Score table: SAMPLE CHROM POS REF ALT REPLICATE SCORE
        #[arg(long)]
        scores: PathBuf,

        /// Run identity used in output names and the ledger
        #[arg(long)]
        run_id: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Shared run ledger
        #[arg(long, default_value = "ledger.tsv")]
        ledger: PathBuf,

        /// Model set whose partitions are recorded in the ledger
        #[arg(long)]
        model_set: Option<String>,

        /// Hyperparameter description recorded in the ledger
        #[arg(long, default_value = "NA")]
        hyperparameters: String,

        /// Skip labels and metrics; write thresholded call sets instead
        #[arg(long)]
        call_mode: bool,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    n_models: usize,
    models: Vec<TrainOutcome>,
}

#[derive(Serialize)]
struct CallOutput {
    model: String,
    n_samples: usize,
    classes: Vec<CallOutcome>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    let config = PipelineConfig::load(&cli.config)?;
    info!(
        path = %cli.config.display(),
        n_model_sets = config.model_sets.len(),
        "config loaded"
    );

    match cli.command {
        Command::Train { model_sets, class } => {
            let sets = if model_sets.is_empty() {
                config.model_sets.iter().collect::<Vec<_>>()
            } else {
                model_sets
                    .iter()
                    .map(|name| config.model_set(name))
                    .collect::<Result<Vec<_>>>()?
            };
            anyhow::ensure!(!sets.is_empty(), "config defines no model sets");

            let mut models = Vec::new();
            for set in sets {
                let outcomes = workflow::train(&config, set, &class.classes())
                    .with_context(|| format!("training {} failed", set.name))?;
                models.extend(outcomes);
            }

            let output = TrainOutput {
                n_models: models.len(),
                models,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Call { sheet, class } => {
            let classes = workflow::call(&config, &sheet, &class.classes())
                .context("calling failed")?;

            let n_samples = classes
                .iter()
                .map(|c| c.result_tables.len())
                .max()
                .unwrap_or(0);
            let output = CallOutput {
                model: config.call_model()?.to_string(),
                n_samples,
                classes,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            scores,
            run_id,
            output_dir,
            ledger,
            model_set,
            hyperparameters,
            call_mode,
        } => {
            let request = EvaluateRequest {
                scores,
                output_dir,
                run_id,
                ledger,
                model_set,
                hyperparameters,
                call_mode,
            };
            let output: EvaluateOutcome =
                workflow::evaluate(&config, &request).context("evaluation failed")?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
