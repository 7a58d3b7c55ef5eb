use clap::{Parser, Subcommand};
use cli::{BatchJobs, Job, run_job};
use color_eyre::eyre::{Result, eyre};
use recognition::{ImageProcessor, ProcessorConfig, RecognitionCommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one operation on one image
    Run {
        /// detect_face, detect_eye, white_background or remove_background
        #[arg(short = 'p', long)]
        operation: RecognitionCommand,
        /// Path to the input image
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the resulting JPEG
        #[arg(short, long)]
        output: PathBuf,
        /// Processor configuration (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run every job of a batch file concurrently
    Batch {
        /// Batch file (.toml or .json) listing input, output and operation per job
        #[arg(short, long)]
        jobs: PathBuf,
        /// Processor configuration (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the configuration schema and the available operations
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { operation, input, output, config } => {
            let processor = load_processor(config.as_deref())?;
            let job = Job { input, output, operation };
            let report = tokio::task::spawn_blocking(move || run_job(&processor, &job)).await??;
            info!("Wrote {} bytes to {:?}", report.bytes_written, report.output);
        }
        Commands::Batch { jobs, config } => {
            let processor = Arc::new(load_processor(config.as_deref())?);
            run_batch(processor, &jobs).await?;
        }
        Commands::Schema => print_schema()?,
    }

    Ok(())
}

fn load_processor(config: Option<&Path>) -> Result<ImageProcessor> {
    let config = match config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            ProcessorConfig::from_file(path)?
        }
        None => ProcessorConfig::default(),
    };
    Ok(ImageProcessor::new(config)?)
}

async fn run_batch(processor: Arc<ImageProcessor>, jobs_path: &Path) -> Result<()> {
    let batch = BatchJobs::from_file(jobs_path)?;
    let total = batch.jobs.len();
    info!("Running {} jobs from {:?}", total, jobs_path);

    let mut tasks = JoinSet::new();
    for job in batch.jobs {
        let processor = Arc::clone(&processor);
        tasks.spawn_blocking(move || {
            let result = run_job(&processor, &job);
            (job, result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((job, Ok(report))) => {
                info!(
                    "{} {:?} -> {:?} ({} bytes)",
                    job.operation, job.input, report.output, report.bytes_written
                );
            }
            Ok((job, Err(e))) => {
                failures += 1;
                error!("{} {:?} failed: {}", job.operation, job.input, e);
            }
            Err(e) => {
                failures += 1;
                error!("Worker task failed: {}", e);
            }
        }
    }

    if failures > 0 {
        return Err(eyre!("{failures} of {total} jobs failed"));
    }
    info!("All {} jobs completed", total);
    Ok(())
}

fn print_schema() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&ProcessorConfig::schema())?);
    println!();
    println!("Operations:");
    for name in RecognitionCommand::command_names() {
        let command: RecognitionCommand = name.parse()?;
        println!("  {:<20} {}", name, command.description());
    }
    Ok(())
}
