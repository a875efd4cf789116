use anyhow::Context;
use atm_incident_triage::{
    config::Config,
    feedback::{FeedbackService, JsonlFeedbackStore},
    ingest,
    ml::ClassifierHandle,
    models::{ActionRating, FeedbackDraft, IssueCategory},
    processing::{TriageProcessor, TriageRun},
    telemetry,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "atm-triage-cli")]
#[command(about = "ATM incident triage CLI", long_about = None)]
struct Cli {
    /// Configuration file (overrides CONFIG_PATH)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the classifier from labeled incidents and save the artifact
    Train {
        /// JSON array of labeled incident records
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact path (defaults to model.artifact_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Triage a batch of incidents
    Triage {
        /// JSON array of incident records
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact path (defaults to model.artifact_path)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Write the full run here, for later feedback
        #[arg(short, long)]
        save_run: Option<PathBuf>,

        /// Print flat ticket rows instead of the full run
        #[arg(short, long)]
        tickets: bool,
    },

    /// Technician feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// Record feedback for an incident of a saved run
    Submit {
        /// Run file written by `triage --save-run`
        #[arg(short, long)]
        run: PathBuf,

        #[arg(short, long)]
        incident_id: String,

        /// helpful, partial or not_helpful
        #[arg(short = 'R', long, default_value = "helpful")]
        rating: ActionRating,

        /// Category the technician observed
        #[arg(short = 'C', long)]
        corrected: Option<IssueCategory>,

        #[arg(short, long, default_value = "")]
        notes: String,

        #[arg(short = 'm', long)]
        resolution_minutes: Option<u32>,
    },

    /// List stored feedback
    List {
        /// Only the most recent entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Prediction accuracy reported by technicians
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    telemetry::init_tracing(&config.observability)?;

    match cli.command {
        Commands::Train { data, output } => {
            let outcome = ingest::read_labeled(&data)
                .with_context(|| format!("reading {}", data.display()))?;
            let (labeled, skipped) =
                ingest::into_training_set(outcome, config.scoring.complaint_weight);
            for (id, error) in &skipped {
                eprintln!("skipped {}: {}", id, error);
            }

            let classifier = ClassifierHandle::from_config(&config.model);
            let metadata = classifier.train(&labeled, &config.model)?;

            let path = output.unwrap_or_else(|| config.model.artifact_path.clone());
            classifier.save(&path)?;

            println!("{}", serde_json::to_string_pretty(&metadata)?);
            eprintln!("model saved to {}", path.display());
        }

        Commands::Triage {
            input,
            model,
            save_run,
            tickets,
        } => {
            let classifier = Arc::new(ClassifierHandle::from_config(&config.model));
            let path = model.unwrap_or_else(|| config.model.artifact_path.clone());
            classifier
                .load(&path)
                .with_context(|| format!("loading model {}", path.display()))?;

            let outcome = ingest::read_batch(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let processor = TriageProcessor::from_config(&config, classifier)?;
            let run = processor.process_ingested(outcome.records, outcome.failures)?;

            if let Some(save_path) = save_run {
                std::fs::write(&save_path, serde_json::to_vec_pretty(&run)?)
                    .with_context(|| format!("writing {}", save_path.display()))?;
            }

            if tickets {
                println!("{}", serde_json::to_string_pretty(&run.tickets())?);
            } else {
                println!("{}", serde_json::to_string_pretty(&run)?);
            }
            eprintln!("{}", serde_json::to_string_pretty(&run.summary())?);
        }

        Commands::Feedback { command } => {
            let service =
                FeedbackService::new(Arc::new(JsonlFeedbackStore::from_config(&config.feedback)));

            match command {
                FeedbackCommands::Submit {
                    run,
                    incident_id,
                    rating,
                    corrected,
                    notes,
                    resolution_minutes,
                } => {
                    let contents = std::fs::read_to_string(&run)
                        .with_context(|| format!("reading {}", run.display()))?;
                    let run: TriageRun = serde_json::from_str(&contents)?;

                    let draft = FeedbackDraft {
                        incident_id,
                        corrected_issue: corrected,
                        rating,
                        notes,
                        resolution_time_minutes: resolution_minutes,
                    };
                    let entry = service.submit_for_run(&run, draft).await?;
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                }

                FeedbackCommands::List { limit } => {
                    let entries = service.entries().await?;
                    let skip = limit.map_or(0, |limit| entries.len().saturating_sub(limit));
                    for entry in &entries[skip..] {
                        println!("{}", serde_json::to_string(entry)?);
                    }
                }

                FeedbackCommands::Summary => {
                    let summary = service.accuracy_summary().await?;
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }
    }

    Ok(())
}
