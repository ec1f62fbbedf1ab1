mod output;
mod scrape;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use revscrape_core::{DateRange, ScrapeOptions};

#[derive(Debug, Parser)]
#[command(name = "revscrape")]
#[command(about = "Extract reviews from the paginated review endpoint")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape reviews for a single place
    Scrape {
        /// Opaque place identifier understood by the endpoint
        #[arg(long)]
        place_id: String,

        /// Human-readable name used for the output file
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Scrape every place listed in a YAML places file
    Batch {
        #[arg(long, env = "REVSCRAPE_PLACES_FILE", default_value = "config/places.yaml")]
        places: PathBuf,

        /// Restrict the batch to one place (by slug)
        #[arg(long)]
        only: Option<String>,

        /// List what would be scraped without sending any request
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        overrides: RunOverrides,
    },
}

/// Flags layered over the environment defaults for every place in the run.
#[derive(Debug, Default, Args)]
struct RunOverrides {
    /// Stop after this many reviews per place
    #[arg(long)]
    max_results: Option<usize>,

    /// 1month, 3months, 6months, 1year, 2years, 3years, 5years, 7years,
    /// all, or YYYY-MM-DD..YYYY-MM-DD
    #[arg(long)]
    date_range: Option<DateRange>,

    /// Sort the output newest first
    #[arg(long)]
    newest: bool,

    #[arg(long)]
    language: Option<String>,

    #[arg(long)]
    region: Option<String>,

    /// Shorter pauses between requests
    #[arg(long)]
    fast: bool,

    /// Stop paging once a page is mostly older than the date range
    #[arg(long)]
    stop_when_past_window: bool,

    /// Directory that receives one JSON file per place
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl RunOverrides {
    fn apply(&self, base: &ScrapeOptions) -> ScrapeOptions {
        let mut options = base.clone();
        if self.max_results.is_some() {
            options.max_results = self.max_results;
        }
        if let Some(range) = self.date_range {
            options.date_range = range;
        }
        if self.newest {
            options.sort_by_newest = true;
        }
        if let Some(language) = &self.language {
            options.language.clone_from(language);
        }
        if let Some(region) = &self.region {
            options.region.clone_from(region);
        }
        if self.fast {
            options.fast_mode = true;
        }
        if self.stop_when_past_window {
            options.stop_when_past_window = true;
        }
        options
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = revscrape_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    match cli.command {
        Commands::Scrape {
            place_id,
            name,
            overrides,
        } => {
            let options = overrides.apply(&config.scrape);
            let output_dir = overrides.output_dir.unwrap_or_else(|| config.output_dir.clone());
            let job = scrape::PlaceJob::single(place_id, name, options);
            scrape::run_jobs(&config, &output_dir, vec![job], &cancel).await?;
        }
        Commands::Batch {
            places,
            only,
            dry_run,
            overrides,
        } => {
            let base = overrides.apply(&config.scrape);
            let jobs = scrape::load_jobs(&places, only.as_deref(), &base)?;
            if dry_run {
                let names: Vec<&str> = jobs.iter().map(|j| j.slug.as_str()).collect();
                println!(
                    "dry-run: would scrape {} places: [{}]",
                    jobs.len(),
                    names.join(", ")
                );
                return Ok(());
            }
            let output_dir = overrides.output_dir.unwrap_or_else(|| config.output_dir.clone());
            scrape::run_jobs(&config, &output_dir, jobs, &cancel).await?;
        }
    }

    Ok(())
}

/// Cancels `token` on the first Ctrl-C. Runs stop between pages and return
/// what they have.
fn spawn_ctrl_c_handler(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received ctrl-c, finishing current pages");
                token.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "failed to listen for ctrl-c"),
        }
    });
}
