//! Sentiment aggregation over fixed time buckets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fbp_core::{NormalizedFeedback, SentimentLabel};
use serde::Serialize;

/// Change in mean score between the last two buckets that still counts as
/// stable.
pub const DEFAULT_STABLE_BAND: f32 = 0.1;

/// Most buckets a trend fills between its first and last scored record.
/// Wider spans list only the occupied buckets.
pub const MAX_FILLED_BUCKETS: usize = 10_000;

const HOUR_SECS: i64 = 3_600;
const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 7 * DAY_SECS;
/// 1970-01-05, the first Monday after the epoch.
const FIRST_MONDAY_SECS: i64 = 4 * DAY_SECS;

/// Bucket width. Buckets are aligned to the Unix epoch in UTC; weekly
/// buckets start on Monday 00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketSize {
    Daily,
    Weekly,
    Hours(u32),
}

impl BucketSize {
    fn width_secs(self) -> i64 {
        match self {
            BucketSize::Daily => DAY_SECS,
            BucketSize::Weekly => WEEK_SECS,
            BucketSize::Hours(n) => i64::from(n.max(1)) * HOUR_SECS,
        }
    }

    fn origin_secs(self) -> i64 {
        match self {
            BucketSize::Weekly => FIRST_MONDAY_SECS,
            BucketSize::Daily | BucketSize::Hours(_) => 0,
        }
    }

    /// Start of the bucket containing `ts`, in Unix seconds.
    fn start_of(self, ts: DateTime<Utc>) -> i64 {
        let width = self.width_secs();
        let origin = self.origin_secs();
        (ts.timestamp() - origin).div_euclid(width) * width + origin
    }
}

impl std::str::FromStr for BucketSize {
    type Err = String;

    /// Accepts `daily`, `weekly`, or `<n>h`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(BucketSize::Daily),
            "weekly" | "week" => Ok(BucketSize::Weekly),
            other => other
                .strip_suffix('h')
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .map(BucketSize::Hours)
                .ok_or_else(|| format!("invalid bucket size '{s}' (expected daily, weekly or <n>h)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Scored records in the bucket.
    pub count: usize,
    /// `None` for empty buckets.
    pub mean_score: Option<f32>,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentTrend {
    pub bucket_size: BucketSize,
    pub buckets: Vec<SentimentBucket>,
    /// False when the span exceeded [`MAX_FILLED_BUCKETS`] and empty
    /// buckets were left out.
    pub contiguous: bool,
    pub direction: TrendDirection,
    /// Last bucket mean minus the previous bucket mean.
    pub change: Option<f32>,
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    positive: usize,
    neutral: usize,
    negative: usize,
}

impl Accumulator {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn mean(&self) -> f32 {
        (self.sum / self.count as f64) as f32
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn occupied_bucket(start: i64, width: i64, acc: &Accumulator) -> SentimentBucket {
    SentimentBucket {
        start: at(start),
        end: at(start + width),
        count: acc.count,
        mean_score: Some(acc.mean()),
        positive: acc.positive,
        neutral: acc.neutral,
        negative: acc.negative,
    }
}

/// Aggregate scored records with the default stable band.
#[must_use]
pub fn aggregate(records: &[NormalizedFeedback], bucket_size: BucketSize) -> SentimentTrend {
    aggregate_with_band(records, bucket_size, DEFAULT_STABLE_BAND)
}

/// Aggregate scored records into contiguous buckets between the first and
/// last scored record. Records without a sentiment score are ignored.
///
/// When that span needs more than [`MAX_FILLED_BUCKETS`] buckets only the
/// occupied ones are returned and `contiguous` is false.
#[must_use]
pub fn aggregate_with_band(
    records: &[NormalizedFeedback],
    bucket_size: BucketSize,
    stable_band: f32,
) -> SentimentTrend {
    let mut accumulators: BTreeMap<i64, Accumulator> = BTreeMap::new();
    for record in records {
        let Some(score) = record.sentiment_score else {
            continue;
        };
        let acc = accumulators
            .entry(bucket_size.start_of(record.created_at))
            .or_default();
        acc.count += 1;
        acc.sum += f64::from(score);
        match record.sentiment_label {
            Some(SentimentLabel::Positive) => acc.positive += 1,
            Some(SentimentLabel::Negative) => acc.negative += 1,
            Some(SentimentLabel::Neutral) | None => acc.neutral += 1,
        }
    }

    let width = bucket_size.width_secs();
    let bounds = accumulators
        .keys()
        .next()
        .copied()
        .zip(accumulators.keys().next_back().copied());
    let span = bounds.map_or(0, |(first, last)| {
        usize::try_from((last - first) / width).map_or(usize::MAX, |n| n.saturating_add(1))
    });
    let contiguous = span <= MAX_FILLED_BUCKETS;
    if !contiguous {
        tracing::warn!(
            span,
            occupied = accumulators.len(),
            "sentiment trend span too wide, listing occupied buckets only"
        );
    }

    let mut buckets = Vec::with_capacity(if contiguous { span } else { accumulators.len() });
    if let (true, Some((first, last))) = (contiguous, bounds) {
        let mut start = first;
        while start <= last {
            buckets.push(match accumulators.get(&start) {
                Some(acc) => occupied_bucket(start, width, acc),
                None => SentimentBucket {
                    start: at(start),
                    end: at(start + width),
                    count: 0,
                    mean_score: None,
                    positive: 0,
                    neutral: 0,
                    negative: 0,
                },
            });
            start += width;
        }
    } else {
        buckets.extend(
            accumulators
                .iter()
                .map(|(&start, acc)| occupied_bucket(start, width, acc)),
        );
    }

    let change = match buckets.as_slice() {
        [.., previous, last] => match (previous.mean_score, last.mean_score) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        },
        _ => None,
    };
    let direction = match change {
        Some(c) if c > stable_band => TrendDirection::Improving,
        Some(c) if c < -stable_band => TrendDirection::Declining,
        Some(_) => TrendDirection::Stable,
        None => TrendDirection::InsufficientData,
    };

    tracing::debug!(
        buckets = buckets.len(),
        direction = ?direction,
        "sentiment trend aggregated"
    );

    SentimentTrend {
        bucket_size,
        buckets,
        contiguous,
        direction,
        change,
    }
}

/// Count of records per sentiment label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    /// Records not yet classified.
    pub unscored: usize,
}

impl LabelDistribution {
    #[must_use]
    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative + self.unscored
    }
}

#[must_use]
pub fn label_distribution(records: &[NormalizedFeedback]) -> LabelDistribution {
    records
        .iter()
        .fold(LabelDistribution::default(), |mut dist, record| {
            match record.sentiment_label {
                Some(SentimentLabel::Positive) => dist.positive += 1,
                Some(SentimentLabel::Neutral) => dist.neutral += 1,
                Some(SentimentLabel::Negative) => dist.negative += 1,
                None => dist.unscored += 1,
            }
            dist
        })
}

#[cfg(test)]
#[path = "trend_test.rs"]
mod tests;
