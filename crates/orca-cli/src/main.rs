//! Orca CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::ApiClient;

#[derive(Parser)]
#[command(name = "orca")]
#[command(about = "Orca job orchestration CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "ORCA_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Fetch job artifacts
    Artifacts {
        #[command(subcommand)]
        command: ArtifactCommands,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Submit a repository for processing
    Create {
        /// Repository URL or other source reference
        source_ref: String,
    },
    /// List recent jobs
    List {
        /// Maximum number of jobs to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show job details
    Show {
        /// Job ID
        id: String,
    },
    /// Report a status change, as a worker would
    Status {
        /// Job ID
        id: String,
        /// New status (queued, analyzing, building, training, deploying, completed, failed)
        status: String,
        /// Failure reason, only valid with `failed`
        #[arg(long)]
        error: Option<String>,
        /// Serving endpoint of the deployed model
        #[arg(long)]
        endpoint: Option<String>,
        /// Storage path of the trained model
        #[arg(long)]
        model_path: Option<String>,
        /// Deployment dashboard URL
        #[arg(long)]
        deployment_url: Option<String>,
    },
    /// Delete a job record
    Delete {
        /// Job ID
        id: String,
        /// Also delete the job's artifacts
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
enum ArtifactCommands {
    /// List a job's artifacts
    List {
        /// Job ID
        id: String,
    },
    /// Download a single artifact
    Download {
        /// Job ID
        id: String,
        /// Artifact path relative to the job, e.g. `ci/github.yml`
        path: String,
        /// Output file (defaults to the artifact's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download every artifact as a zip archive
    Bundle {
        /// Job ID
        id: String,
        /// Output file (defaults to `<id>-artifacts.zip`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Jobs { command } => match command {
            JobCommands::Create { source_ref } => {
                commands::jobs::create(&client, &source_ref).await?;
            }
            JobCommands::List { limit } => {
                commands::jobs::list(&client, limit).await?;
            }
            JobCommands::Show { id } => {
                commands::jobs::show(&client, &id).await?;
            }
            JobCommands::Status {
                id,
                status,
                error,
                endpoint,
                model_path,
                deployment_url,
            } => {
                let refs = orca_core::ResultRefs {
                    endpoint,
                    model_path,
                    deployment_url,
                    ..Default::default()
                };
                commands::jobs::status(&client, &id, &status, error, refs).await?;
            }
            JobCommands::Delete { id, cascade } => {
                commands::jobs::delete(&client, &id, cascade).await?;
            }
        },
        Commands::Artifacts { command } => match command {
            ArtifactCommands::List { id } => {
                commands::artifacts::list(&client, &id).await?;
            }
            ArtifactCommands::Download { id, path, output } => {
                commands::artifacts::download(&client, &id, &path, output).await?;
            }
            ArtifactCommands::Bundle { id, output } => {
                commands::artifacts::bundle(&client, &id, output).await?;
            }
        },
    }

    Ok(())
}
