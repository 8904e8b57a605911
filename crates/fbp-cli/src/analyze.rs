//! `analyze` command: sentiment, themes with evolution, and prioritization
//! over a record snapshot.
//!
//! Every engine computes over the loaded batch first; derived fields are
//! written back to the store only after all of them have finished.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use fbp_core::{AppConfig, FeedbackStore, NormalizedFeedback, ThemeId};
use fbp_priority::{
    contexts_for, frequency_index, FactorSet, PriorityConfig, PriorityScorer, RankedFeedback,
};
use fbp_sentiment::{label_distribution, SentimentEngine};
use fbp_themes::{
    duplicate_counts, group_similar, track_evolution, EvolutionConfig, EvolutionReport,
    ThemeConfig, ThemeExtractor, DEFAULT_SIMILARITY_THRESHOLD,
};

use crate::snapshot::{self, ThemeState};

#[derive(Debug, Clone)]
pub(crate) struct AnalyzeOptions {
    pub input: PathBuf,
    pub themes: PathBuf,
    pub num_themes: usize,
    pub min_frequency: usize,
    pub factors: FactorSet,
    pub top: usize,
}

/// Run the analyze command and print a markdown report.
///
/// # Errors
///
/// Returns an error if the snapshot or theme state cannot be read or
/// written, or the theme or priority configuration is invalid. A theme
/// extraction that degrades is reported and leaves the stored themes as
/// they were.
#[allow(clippy::too_many_lines)]
pub(crate) async fn run_analyze(config: &AppConfig, options: &AnalyzeOptions) -> anyhow::Result<()> {
    let store = snapshot::load_store(&options.input).await?;
    let mut records = snapshot::all_records(&store).await?;
    if records.is_empty() {
        println!("no feedback to analyze; run `ingest` first");
        return Ok(());
    }

    let engine = SentimentEngine::select(config).await;
    let assessments = engine.classify_batch(&records).await;
    fbp_sentiment::assign(&mut records, &assessments);

    let theme_config = ThemeConfig::from_app_config(config);
    let state = snapshot::read_themes(&options.themes).await?;
    let extractor = ThemeExtractor::new(theme_config.clone())?.resume_after(state.generation);
    let mut extraction = extractor.extract(&records, options.num_themes, options.min_frequency);

    let evolution = if let Some(err) = &extraction.degraded {
        tracing::warn!(error = %err, kind = err.kind(), "theme extraction degraded; keeping previous themes");
        None
    } else {
        let report = track_evolution(
            &state.themes,
            &extraction.themes,
            &EvolutionConfig::from_app_config(config),
        );
        report.remap_memberships(&mut extraction.memberships);
        Some(report)
    };

    let groups = group_similar(&records, &theme_config, DEFAULT_SIMILARITY_THRESHOLD);
    let duplicates = duplicate_counts(&groups, records.len());
    let index = match &evolution {
        Some(report) => frequency_index(&report.themes, &extraction.memberships),
        None => BTreeMap::new(),
    };
    let contexts = contexts_for(&records, &index, &duplicates, Utc::now());

    let scorer = PriorityScorer::new(PriorityConfig::from_app_config(config)?)?;
    let ranked = scorer.rank(&records, &options.factors, &contexts)?;
    fbp_priority::apply(&mut records, &ranked);

    let saved = store.save_analysis(&records).await?;
    let themes = if let Some(report) = &evolution {
        store
            .save_themes(&report.themes, &extraction.memberships)
            .await?;
        report.themes.clone()
    } else {
        state.themes.clone()
    };

    snapshot::write_records(&options.input, &snapshot::all_records(&store).await?).await?;
    snapshot::write_themes(
        &options.themes,
        &ThemeState {
            generation: extraction.generation,
            themes,
        },
    )
    .await?;

    tracing::info!(
        records = records.len(),
        saved,
        generation = extraction.generation,
        degraded = extraction.is_degraded(),
        model = engine.has_model(),
        "analysis complete"
    );

    print_report(&records, evolution.as_ref(), &ranked, options);
    if let Some(err) = &extraction.degraded {
        println!("\n> theme extraction degraded ({err}); previous themes kept");
    }
    Ok(())
}

fn print_report(
    records: &[NormalizedFeedback],
    evolution: Option<&EvolutionReport>,
    ranked: &[RankedFeedback],
    options: &AnalyzeOptions,
) {
    let now = Utc::now().format("%Y-%m-%d %H:%M UTC");
    let distribution = label_distribution(records);
    let factors: Vec<&str> = options.factors.iter().map(|f| f.as_str()).collect();

    println!("# Feedback Analysis");
    println!();
    println!("**Generated**: {now}");
    println!("**Records**: {}", records.len());
    println!(
        "**Sentiment**: {} positive, {} neutral, {} negative",
        distribution.positive, distribution.neutral, distribution.negative
    );
    println!("**Factors**: {}", factors.join(", "));
    println!();

    if let Some(report) = evolution {
        println!("## Themes");
        println!();
        println!("| Theme | Keywords | Frequency | Trend |");
        println!("|-------|----------|-----------|-------|");
        let trends = theme_trends(report);
        for theme in report.themes.iter().filter(|t| t.is_active()) {
            println!(
                "| {} | {} | {} | {} |",
                theme.name,
                theme.keywords.join(", "),
                theme.frequency,
                trends.get(&theme.id).map_or("", String::as_str)
            );
        }
        println!();
    }

    println!("## Top {} by impact", options.top.min(ranked.len()));
    println!();
    println!("| Rank | Score | Priority | Tier | Sentiment | Title |");
    println!("|------|-------|----------|------|-----------|-------|");
    for (rank, entry) in ranked.iter().take(options.top).enumerate() {
        let Some(record) = records.get(entry.index) else {
            continue;
        };
        let sentiment = record
            .sentiment_score
            .map_or_else(|| "\u{2014}".to_string(), |s| format!("{s:+.2}"));
        println!(
            "| {} | {} | {} | {} | {} | {} |",
            rank + 1,
            entry.assessment.impact_score,
            entry.assessment.priority_level,
            record.customer_tier,
            sentiment,
            record.title
        );
    }
}

/// Short trend label per theme id for the report table.
fn theme_trends(report: &EvolutionReport) -> BTreeMap<ThemeId, String> {
    let mut trends = BTreeMap::new();
    for persisting in &report.persisting {
        trends.insert(
            persisting.theme.id,
            format!("{:?} ({:+.0}%)", persisting.growth, persisting.growth_rate * 100.0).to_lowercase(),
        );
    }
    for theme in &report.emerging {
        trends.insert(theme.id, "emerging".to_owned());
    }
    for theme in &report.declining {
        trends.insert(theme.id, "declining".to_owned());
    }
    for theme in &report.retired {
        trends.insert(theme.id, "retired".to_owned());
    }
    trends
}
