mod config;
mod mappings_cmd;
mod process_cmd;
mod status_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::AppConfig;

#[derive(Parser)]
#[command(name = "nameplate")]
#[command(about = "Extract and normalize equipment nameplate fields from photos")]
#[command(version)]
struct Cli {
    /// Config file (defaults to NAMEPLATE_CONFIG or ~/.nameplate/nameplate.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every image in the input directory
    Process {
        /// Directory to scan instead of `paths.input_dir`
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Use the offline mock backends
        #[arg(long)]
        mock: bool,
        /// Also write a full report
        #[arg(long)]
        report: bool,
    },
    /// Process one image and save `<stem>_ocr.json`
    Single {
        image: PathBuf,
        #[arg(long)]
        mock: bool,
    },
    /// Normalize a raw OCR JSON object from a file or stdin
    Normalize { file: Option<PathBuf> },
    /// Teach the normalizer that a raw key means a canonical field
    Learn { raw_key: String, field: String },
    /// Check the config and re-validate saved records
    Validate,
    /// List recorded bulk jobs, newest first
    Jobs {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show mapping and bulk job statistics
    Stats,
    /// Write a config file with every default
    InitConfig {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::InitConfig { force } => {
            nameplate_logging::init_logger(None, "info");
            return config::init(cli.config.as_deref(), force).await;
        }
        other => other,
    };

    let mut app = AppConfig::load(cli.config.as_deref()).await?;
    let logs_dir = app.config.paths.logs_dir.clone();
    let file_logging =
        app.config.logging.json_file && tokio::fs::create_dir_all(&logs_dir).await.is_ok();
    nameplate_logging::init_logger(
        file_logging.then_some(logs_dir.as_path()),
        &app.config.logging.level,
    );

    match command {
        Commands::Process {
            input,
            mock,
            report,
        } => {
            if mock {
                app.use_mock();
            }
            process_cmd::run(&app, input, report).await?;
        }
        Commands::Single { image, mock } => {
            if mock {
                app.use_mock();
            }
            process_cmd::single(&app, &image).await?;
        }
        Commands::Normalize { file } => mappings_cmd::normalize(&app, file.as_deref()).await?,
        Commands::Learn { raw_key, field } => mappings_cmd::learn(&app, &raw_key, &field).await?,
        Commands::Validate => status_cmd::validate(&app).await?,
        Commands::Jobs { limit } => status_cmd::jobs(&app, limit).await?,
        Commands::Stats => status_cmd::stats(&app).await?,
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}
