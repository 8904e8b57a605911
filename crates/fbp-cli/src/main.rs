mod analyze;
mod ingest;
mod snapshot;
mod trend;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fbp_core::Source;
use fbp_sentiment::BucketSize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::analyze::AnalyzeOptions;
use crate::ingest::IngestOptions;
use crate::trend::TrendOptions;

#[derive(Debug, Parser)]
#[command(name = "fbp-cli")]
#[command(about = "Customer feedback pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync feedback from configured sources into a local snapshot
    Ingest {
        /// Restrict the sync to one source (e.g. zendesk)
        #[arg(long)]
        source: Option<Source>,
        /// Read records from a JSON export instead of the source's API
        #[arg(long, requires = "source")]
        file: Option<PathBuf>,
        /// Earliest creation date to fetch (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Latest creation date to fetch (YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Maximum records per source
        #[arg(long)]
        limit: Option<usize>,
        /// Snapshot file to merge into
        #[arg(long, default_value = "feedback.json")]
        out: PathBuf,
        /// Preview which sources would be synced without fetching
        #[arg(long)]
        dry_run: bool,
    },
    /// Score sentiment, extract themes and rank feedback by impact
    Analyze {
        /// Snapshot file to analyze; derived fields are written back
        #[arg(long, default_value = "feedback.json")]
        input: PathBuf,
        /// Theme state carried between runs
        #[arg(long, default_value = "themes.json")]
        themes: PathBuf,
        /// Number of themes to extract
        #[arg(long, default_value = "8")]
        num_themes: usize,
        /// Minimum members for a theme to be kept
        #[arg(long, default_value = "3")]
        min_frequency: usize,
        /// Comma-separated priority factors
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "customer_tier,sentiment,frequency,recency"
        )]
        factors: Vec<String>,
        /// Number of ranked records to print
        #[arg(long, default_value = "20")]
        top: usize,
    },
    /// Show sentiment over time
    Trend {
        /// Analyzed snapshot file
        #[arg(long, default_value = "feedback.json")]
        input: PathBuf,
        /// Bucket size: daily, weekly, or <n>h
        #[arg(long, default_value = "daily")]
        bucket: BucketSize,
        /// Restrict to one source
        #[arg(long)]
        source: Option<Source>,
        /// Earliest creation date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Latest creation date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Print the trend as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = fbp_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Ingest {
            source,
            file,
            since,
            until,
            limit,
            out,
            dry_run,
        }) => {
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_signal(cancel.clone()));
            let options = IngestOptions {
                source,
                file,
                since,
                until,
                limit,
                out,
                dry_run,
            };
            ingest::run_ingest(&config, &options, &cancel).await?;
        }
        Some(Commands::Analyze {
            input,
            themes,
            num_themes,
            min_frequency,
            factors,
            top,
        }) => {
            let options = AnalyzeOptions {
                input,
                themes,
                num_themes,
                min_frequency,
                factors: fbp_priority::parse_factors(&factors)?,
                top,
            };
            analyze::run_analyze(&config, &options).await?;
        }
        Some(Commands::Trend {
            input,
            bucket,
            source,
            since,
            until,
            json,
        }) => {
            let options = TrendOptions {
                input,
                bucket,
                source,
                since,
                until,
                json,
            };
            trend::run_trend(&options).await?;
        }
        None => println!("fbp-cli ready; run with --help for commands"),
    }

    Ok(())
}

/// Cancel in-flight syncs on ctrl-c. Pages already fetched still land.
async fn cancel_on_signal(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("received ctrl-c, cancelling sync");
        cancel.cancel();
    }
}
