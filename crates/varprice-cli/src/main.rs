mod run;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use varprice_core::ConfigError;
use varprice_scraper::ScraperError;

#[derive(Debug, Parser)]
#[command(name = "varprice")]
#[command(about = "Per-variant price extraction for script-rendered storefronts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl the target listing and write one record per product variant.
    Run(RunArgs),
    /// Print the effective site profile as YAML.
    Profile {
        /// Site profile YAML; defaults to `VARPRICE_PROFILE_PATH`.
        #[arg(long)]
        profile: Option<PathBuf>,
    },
}

/// Flags override the matching `VARPRICE_*` environment variables.
#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Listing or single-product URL.
    #[arg(long)]
    url: Option<String>,
    /// Requests per second against the target.
    #[arg(long)]
    rate: Option<f64>,
    /// Site profile YAML.
    #[arg(long)]
    profile: Option<PathBuf>,
    /// Output file.
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long, value_parser = ["csv", "json"])]
    format: Option<String>,
    /// Concurrent product workers.
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long, value_parser = ["chromium", "http"])]
    backend: Option<String>,
    /// Stop pagination after this many listing pages.
    #[arg(long)]
    max_pages: Option<usize>,
    /// Emit unavailable combinations with `available=false`.
    #[arg(long)]
    record_unavailable: bool,
}

impl RunArgs {
    /// Flag values keyed by the environment variable they replace.
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        if let Some(url) = &self.url {
            overrides.insert("VARPRICE_TARGET_URL", url.clone());
        }
        if let Some(rate) = self.rate {
            overrides.insert("VARPRICE_REQUESTS_PER_SECOND", rate.to_string());
        }
        if let Some(profile) = &self.profile {
            overrides.insert("VARPRICE_PROFILE_PATH", profile.display().to_string());
        }
        if let Some(output) = &self.output {
            overrides.insert("VARPRICE_OUTPUT_PATH", output.display().to_string());
        }
        if let Some(format) = &self.format {
            overrides.insert("VARPRICE_OUTPUT_FORMAT", format.clone());
        }
        if let Some(workers) = self.workers {
            overrides.insert("VARPRICE_WORKERS", workers.to_string());
        }
        if let Some(backend) = &self.backend {
            overrides.insert("VARPRICE_BACKEND", backend.clone());
        }
        if let Some(max_pages) = self.max_pages {
            overrides.insert("VARPRICE_MAX_PAGES", max_pages.to_string());
        }
        if self.record_unavailable {
            overrides.insert("VARPRICE_RECORD_UNAVAILABLE", "true".to_string());
        }
        overrides
    }
}

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_UNREACHABLE: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run::run_scrape(&args.overrides()).await,
        Commands::Profile { profile } => run::print_profile(profile),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "run failed");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Maps a failure onto the process exit code: configuration problems and an
/// unreachable target are distinguished from everything else.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return EXIT_CONFIG;
        }
        match cause.downcast_ref::<ScraperError>() {
            Some(ScraperError::Config(_)) => return EXIT_CONFIG,
            Some(ScraperError::TargetUnreachable { .. }) => return EXIT_UNREACHABLE,
            _ => {}
        }
    }
    EXIT_FAILURE
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
