use chrono::{Duration, TimeZone, Utc};
use fbp_core::{CustomerTier, FeedbackPatch, Source, ThemeStatus};

use super::*;
use crate::config::{all_factors, FactorWeights};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
}

fn record(id: &str, tier: CustomerTier, sentiment: Option<f32>, age_hours: i64) -> NormalizedFeedback {
    let mut patch = FeedbackPatch::empty(Source::Intercom);
    patch.source_id = Some(id.to_owned());
    patch.content = Some(format!("feedback {id}"));
    patch.customer_tier = Some(tier);
    patch.created_at = Some(now() - Duration::hours(age_hours));
    let mut record = patch.into_record(now()).unwrap();
    record.sentiment_score = sentiment;
    record
}

fn scorer() -> PriorityScorer {
    PriorityScorer::new(PriorityConfig::default()).unwrap()
}

fn only(factors: &[Factor]) -> FactorSet {
    factors.iter().copied().collect()
}

fn ctx(frequency: usize) -> ScoringContext {
    ScoringContext::new(now(), frequency)
}

#[test]
fn tier_is_monotonic() {
    let scorer = scorer();
    let mut last = 0;
    for tier in CustomerTier::ALL {
        let score = scorer
            .score(&record("a", tier, Some(-0.2), 24), &all_factors(), &ctx(3))
            .impact_score;
        assert!(score >= last, "{tier} scored {score} after {last}");
        last = score;
    }
}

#[test]
fn older_feedback_never_scores_higher() {
    let scorer = scorer();
    let mut last = u8::MAX;
    for age in [0, 1, 24, 168, 720, 8760] {
        let score = scorer
            .score(&record("a", CustomerTier::Business, Some(0.0), age), &all_factors(), &ctx(2))
            .impact_score;
        assert!(score <= last, "age {age}h scored {score} after {last}");
        last = score;
    }
}

#[test]
fn recency_halves_at_half_life_and_ignores_future() {
    let scorer = scorer();
    let week = scorer.sub_score(Factor::Recency, &record("a", CustomerTier::Free, None, 168), &ctx(0));
    assert!((week - 0.5).abs() < 1e-9);

    let future = scorer.sub_score(Factor::Recency, &record("b", CustomerTier::Free, None, -5), &ctx(0));
    assert!((future - 1.0).abs() < 1e-9);

    let ancient = scorer.sub_score(Factor::Recency, &record("c", CustomerTier::Free, None, 24 * 365), &ctx(0));
    assert!(ancient > 0.0);
}

#[test]
fn negative_sentiment_raises_urgency() {
    let scorer = scorer();
    let factors = only(&[Factor::Sentiment]);
    let angry = scorer.score(&record("a", CustomerTier::Free, Some(-1.0), 0), &factors, &ctx(0));
    let neutral = scorer.score(&record("b", CustomerTier::Free, None, 0), &factors, &ctx(0));
    let happy = scorer.score(&record("c", CustomerTier::Free, Some(1.0), 0), &factors, &ctx(0));

    assert_eq!(angry.impact_score, 100);
    assert_eq!(neutral.impact_score, 50);
    assert_eq!(happy.impact_score, 0);
}

#[test]
fn frequency_saturates_at_cap() {
    let scorer = scorer();
    let rec = record("a", CustomerTier::Free, None, 0);
    assert!(scorer.sub_score(Factor::Frequency, &rec, &ctx(0)).abs() < 1e-9);
    assert!((scorer.sub_score(Factor::Frequency, &rec, &ctx(25)) - 1.0).abs() < 1e-9);
    assert!((scorer.sub_score(Factor::Frequency, &rec, &ctx(10_000)) - 1.0).abs() < 1e-9);
    let mid = scorer.sub_score(Factor::Frequency, &rec, &ctx(5));
    assert!(mid > 0.0 && mid < 1.0);
}

#[test]
fn weights_renormalize_over_enabled_subset() {
    let scorer = scorer();
    let rec = record("a", CustomerTier::Enterprise, Some(1.0), 0);
    let assessment = scorer.score(&rec, &only(&[Factor::CustomerTier]), &ctx(0));

    assert_eq!(assessment.impact_score, 100);
    assert_eq!(assessment.priority_level, PriorityLevel::Critical);
    assert_eq!(assessment.contributions.len(), 1);
    assert!((assessment.contributions[0].weight - 1.0).abs() < 1e-9);

    let both = scorer.score(&rec, &only(&[Factor::CustomerTier, Factor::Sentiment]), &ctx(0));
    let weight_sum: f64 = both.contributions.iter().map(|c| c.weight).sum();
    assert!((weight_sum - 1.0).abs() < 1e-9);
    // 0.35 / 0.65 of the tier factor at full marks.
    assert_eq!(both.impact_score, 54);
}

#[test]
fn no_factors_scores_zero() {
    let assessment = scorer().score(
        &record("a", CustomerTier::Enterprise, Some(-1.0), 0),
        &FactorSet::new(),
        &ctx(10),
    );
    assert_eq!(assessment.impact_score, 0);
    assert_eq!(assessment.priority_level, PriorityLevel::Low);
    assert!(assessment.contributions.is_empty());
}

#[test]
fn zero_weight_subset_scores_zero() {
    let config = PriorityConfig {
        weights: FactorWeights {
            recency: 0.0,
            ..FactorWeights::default()
        },
        ..PriorityConfig::default()
    };
    let scorer = PriorityScorer::new(config).unwrap();
    let assessment = scorer.score(
        &record("a", CustomerTier::Free, None, 0),
        &only(&[Factor::Recency]),
        &ctx(0),
    );
    assert_eq!(assessment.impact_score, 0);
}

#[test]
fn scoring_is_pure() {
    let scorer = scorer();
    let rec = record("a", CustomerTier::Business, Some(-0.4), 30);
    let first = scorer.score(&rec, &all_factors(), &ctx(4));
    let _ = scorer.score(&record("b", CustomerTier::Free, None, 0), &all_factors(), &ctx(0));
    let second = scorer.score(&rec, &all_factors(), &ctx(4));
    assert_eq!(first, second);
}

#[test]
fn rank_orders_by_score_then_recency_then_id() {
    let scorer = scorer();
    let records = vec![
        record("low", CustomerTier::Free, Some(0.9), 500),
        record("old", CustomerTier::Enterprise, Some(-0.9), 48),
        record("new", CustomerTier::Enterprise, Some(-0.9), 48),
    ];
    // Same score for the last two; break the tie with created_at.
    let mut records = records;
    records[2].created_at += Duration::minutes(1);
    let factors = only(&[Factor::CustomerTier, Factor::Sentiment]);
    let contexts = vec![ctx(0); 3];

    let ranked = scorer.rank(&records, &factors, &contexts).unwrap();
    let order: Vec<usize> = ranked.iter().map(|r| r.index).collect();
    assert_eq!(order, vec![2, 1, 0]);
}

#[test]
fn rank_rejects_context_mismatch() {
    let records = vec![record("a", CustomerTier::Free, None, 0)];
    let err = scorer().rank(&records, &all_factors(), &[]).unwrap_err();
    assert_eq!(
        err,
        PriorityError::ContextMismatch {
            records: 1,
            contexts: 0
        }
    );
}

#[test]
fn frequency_index_sums_theme_sizes() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let login = Uuid::new_v4();
    let billing = Uuid::new_v4();
    let membership = |theme_id, feedback_id| ThemeMembership {
        theme_id,
        feedback_id,
        relevance: 1.0,
    };
    let memberships = vec![
        membership(login, a),
        membership(login, b),
        membership(billing, a),
    ];
    let themes = vec![Theme {
        id: billing,
        name: "Billing".into(),
        keywords: vec!["billing".into()],
        frequency: 9,
        confidence: 1.0,
        first_seen: now(),
        last_seen: now(),
        status: ThemeStatus::Active,
        empty_runs: 0,
        history: vec![9],
    }];

    let index = frequency_index(&themes, &memberships);
    assert_eq!(index[&a], 2 + 9);
    assert_eq!(index[&b], 2);
}

#[test]
fn contexts_add_duplicates_and_apply_assigns() {
    let scorer = scorer();
    let mut records = vec![
        record("a", CustomerTier::Enterprise, Some(-0.8), 1),
        record("b", CustomerTier::Free, Some(0.5), 300),
    ];
    let mut index = BTreeMap::new();
    index.insert(records[0].id, 4);
    let contexts = contexts_for(&records, &index, &[1, 2], now());
    assert_eq!(contexts[0].frequency, 5);
    assert_eq!(contexts[1].frequency, 2);

    let ranked = scorer.rank(&records, &all_factors(), &contexts).unwrap();
    apply(&mut records, &ranked);

    for entry in &ranked {
        let record = &records[entry.index];
        assert_eq!(record.impact_score, Some(entry.assessment.impact_score));
        assert_eq!(record.priority_level, Some(entry.assessment.priority_level));
    }
    assert!(records[0].impact_score > records[1].impact_score);
}
