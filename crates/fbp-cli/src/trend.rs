//! `trend` command: bucketed sentiment over an analyzed snapshot.

use std::path::PathBuf;

use chrono::NaiveDate;
use fbp_core::{FeedbackQuery, FeedbackStore, Source};
use fbp_sentiment::{aggregate, BucketSize, SentimentTrend, TrendDirection};

use crate::snapshot;

#[derive(Debug, Clone)]
pub(crate) struct TrendOptions {
    pub input: PathBuf,
    pub bucket: BucketSize,
    pub source: Option<Source>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub json: bool,
}

impl TrendOptions {
    fn query(&self) -> FeedbackQuery {
        FeedbackQuery {
            source: self.source.clone(),
            created_after: self
                .since
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            created_before: self
                .until
                .and_then(|d| d.and_hms_opt(23, 59, 59))
                .map(|dt| dt.and_utc()),
            ..FeedbackQuery::default()
        }
    }
}

/// Print the sentiment trend for the selected records.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read or the trend cannot be
/// serialized.
pub(crate) async fn run_trend(options: &TrendOptions) -> anyhow::Result<()> {
    let store = snapshot::load_store(&options.input).await?;
    let records = store.query(&options.query()).await?;

    if records.iter().all(|r| r.sentiment_score.is_none()) {
        println!("no scored feedback in range; run `analyze` first");
        return Ok(());
    }

    let trend = aggregate(&records, options.bucket);
    if options.json {
        println!("{}", serde_json::to_string_pretty(&trend)?);
    } else {
        print_table(&trend);
    }
    Ok(())
}

fn direction_label(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Improving => "improving",
        TrendDirection::Declining => "declining",
        TrendDirection::Stable => "stable",
        TrendDirection::InsufficientData => "insufficient data",
    }
}

fn print_table(trend: &SentimentTrend) {
    println!(
        "{:<18}{:<8}{:<8}{:<6}{:<6}NEG",
        "BUCKET", "COUNT", "MEAN", "POS", "NEU"
    );
    for bucket in &trend.buckets {
        let mean = bucket
            .mean_score
            .map_or_else(|| "\u{2014}".to_string(), |m| format!("{m:+.2}"));
        println!(
            "{:<18}{:<8}{:<8}{:<6}{:<6}{}",
            bucket.start.format("%Y-%m-%d %H:%M"),
            bucket.count,
            mean,
            bucket.positive,
            bucket.neutral,
            bucket.negative
        );
    }
    let change = trend
        .change
        .map(|c| format!(" ({c:+.2})"))
        .unwrap_or_default();
    if !trend.contiguous {
        println!("\nspan too wide to fill; only buckets with feedback are listed");
    }
    println!("\ntrend: {}{change}", direction_label(trend.direction));
}
