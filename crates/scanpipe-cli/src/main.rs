//! Local driver for the scanpipe pipeline.
//!
//! `submit` performs the whole flow the cloud wiring splits across
//! collaborators: create the pending record, store the upload, and run the
//! orchestrator on the resulting event. `status` reads the decoded result
//! view the polling client sees.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use scanpipe::db::job_repo;
use scanpipe::{load_config, Config, Database, FsObjectStore, Orchestrator, UploadEvent};

#[derive(Parser)]
#[command(name = "scanpipe", about = "Image-analysis job pipeline driver", version)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit an image (raster or DICOM) and process it to a terminal state.
    Submit {
        /// Image file to analyze.
        file: PathBuf,
        /// Declared MIME type; inferred from the name when omitted.
        #[arg(long)]
        file_type: Option<String>,
    },
    /// Print the stored result for a job as JSON.
    Status {
        job_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let db = Database::open(&config.database_path)?;

    match cli.command {
        Command::Submit { file, file_type } => {
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or("input file has no usable name")?
                .to_string();
            let data = std::fs::read(&file)?;

            let created = scanpipe::intake::create_job(&db, &file_name, file_type.as_deref())?;
            let store = FsObjectStore::new(&config.data_dir);
            store.put(&created.upload_key, &data)?;

            let orchestrator = Orchestrator::from_config(&config, db.clone())?;
            let event =
                UploadEvent::from_key(&created.upload_key).ok_or("malformed upload key")?;
            let outcome = orchestrator.process(event).await;
            tracing::info!(?outcome, job_id = %created.job_id, "job finished");

            println!("{}", created.job_id);
        }
        Command::Status { job_id } => match job_repo::fetch_view(&db, &job_id)? {
            Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
            None => return Err(format!("job {} not found", job_id).into()),
        },
    }

    Ok(())
}
