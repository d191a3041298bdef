mod app;
mod client;

use app::{CliApp, EvaluateRequest, Settings};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vision-ad", version = env!("VISION_AD_VERSION"), about = "Vision AD inference client and batch evaluator")]
struct Cli {
    /// Inference server URL (overrides the settings file)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Descend into subfolders when collecting images from a folder
    #[arg(long, global = true)]
    recursive: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one image and show the overlay size
    Single {
        image: PathBuf,
        /// Save the returned overlay image
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Run batch inference and save the result archive
    Batch {
        /// Image files or folders
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Compute confusion matrix and F1 score for labeled images
    Evaluate(EvaluateArgs),
    /// Show the effective settings
    Config {
        /// Write the effective settings to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Normal image files or folders
    #[arg(long, num_args = 1.., required = true)]
    normal: Vec<PathBuf>,
    /// Abnormal image files or folders
    #[arg(long, num_args = 1.., required = true)]
    abnormal: Vec<PathBuf>,
    /// Scores above this value are judged abnormal
    #[arg(long)]
    threshold: Option<f64>,
    /// Evaluate a saved batch archive instead of running a new batch
    #[arg(long)]
    archive: Option<PathBuf>,
    /// Write per-image results as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Write the result record as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Extract overlay images from the saved archive into this folder
    #[arg(long, requires = "archive")]
    artifacts: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings_path = cli.config.or_else(Settings::default_path);
    let mut settings = match &settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(url) = cli.url {
        settings.base_url = url;
    }
    if cli.recursive {
        settings.recursive = true;
    }

    let app = CliApp::new(settings, settings_path);
    tracing::debug!("inference server: {}", app.settings().base_url);

    match cli.command {
        Command::Single { image, save } => app.run_single(&image, save.as_deref()),
        Command::Batch { inputs, output } => app.run_batch(&inputs, &output),
        Command::Evaluate(args) => {
            let request = EvaluateRequest {
                normal: args.normal,
                abnormal: args.abnormal,
                threshold: args.threshold,
                archive: args.archive,
                csv: args.csv,
                json: args.json,
                artifacts: args.artifacts,
            };
            app.run_evaluate(&request).map(|_| ())
        }
        Command::Config { save } => app.run_config(save),
    }
}
