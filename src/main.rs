use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kfdl::{Config, Kfdl, RunSummary};
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML or JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every episode not yet recorded as successful
    Run {
        /// Directory the media files and the ledger are written to
        #[arg(short = 'w', long)]
        working_directory: Option<PathBuf>,

        /// Ledger file (default: <working-directory>/kfdl-state.txt)
        #[arg(short, long)]
        save_file: Option<PathBuf>,

        /// Number of downloads running at the same time
        #[arg(short = 'p', long)]
        max_parallel_downloads: Option<usize>,

        /// Feed to read the episodes from
        #[arg(long)]
        feed_url: Option<String>,

        /// Do not write tags into finished files
        #[arg(long)]
        no_tags: bool,
    },
    /// Print the effective configuration as TOML and exit
    ShowConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn get_config_path(args: &Args) -> Option<PathBuf> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("KFDL_CONFIG") {
        return Some(PathBuf::from(path));
    }

    None
}

fn load_config(args: &Args) -> Result<Config> {
    match get_config_path(args) {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            Config::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Feed items:          {}", summary.found);
    println!("Excluded by title:   {}", summary.excluded);
    println!("Already downloaded:  {}", summary.already_complete);
    println!("Unresolved:          {}", summary.unresolved);
    println!("Metadata failures:   {}", summary.metadata_failures);
    println!("Queued:              {}", summary.queued);
    println!("Successful:          {}", summary.successful);
    println!("Failed:              {}", summary.failed);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    match args.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }

    let mut config = load_config(&args)?;

    match args.command {
        Command::ShowConfig => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{rendered}");
        }
        Command::Run {
            working_directory,
            save_file,
            max_parallel_downloads,
            feed_url,
            no_tags,
        } => {
            if let Some(dir) = working_directory {
                config.download.working_dir = dir;
            }
            if let Some(path) = save_file {
                config.ledger.path = Some(path);
            }
            if let Some(limit) = max_parallel_downloads {
                config.download.max_parallel_downloads = limit;
            }
            if let Some(url) = feed_url {
                config.feed.url = url;
            }
            if no_tags {
                config.tagging.enabled = false;
            }

            info!(
                working_dir = %config.download.working_dir.display(),
                ledger = %config.ledger_path().display(),
                "Starting kfdl"
            );

            let kfdl = Kfdl::new(config)
                .await
                .context("Failed to initialize downloader")?;
            let summary = kfdl::run_with_shutdown(&kfdl)
                .await
                .context("Run aborted")?;
            print_summary(&summary);

            if summary.failed > 0 {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
