//! Lexicon scorer tuned for customer feedback.

use async_trait::async_trait;

use crate::classifier::SentimentClassifier;
use crate::error::SentimentError;
use crate::types::Polarity;

/// Customer-feedback word weights.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive signals
    ("great", 0.4),
    ("good", 0.3),
    ("nice", 0.3),
    ("excellent", 0.5),
    ("amazing", 0.5),
    ("wonderful", 0.5),
    ("fantastic", 0.5),
    ("awesome", 0.5),
    ("perfect", 0.5),
    ("best", 0.5),
    ("love", 0.5),
    ("loved", 0.5),
    ("loves", 0.5),
    ("impressive", 0.4),
    ("happy", 0.4),
    ("helpful", 0.4),
    ("thank", 0.3),
    ("thanks", 0.3),
    ("recommend", 0.4),
    ("easy", 0.3),
    ("intuitive", 0.3),
    ("smooth", 0.3),
    ("fast", 0.3),
    ("reliable", 0.3),
    ("quality", 0.2),
    ("works", 0.2),
    ("fixed", 0.3),
    ("resolved", 0.3),
    // Negative signals
    ("bad", -0.4),
    ("terrible", -0.6),
    ("awful", -0.6),
    ("horrible", -0.6),
    ("worst", -0.6),
    ("hate", -0.6),
    ("disappointed", -0.5),
    ("disappointing", -0.5),
    ("frustrating", -0.5),
    ("frustrated", -0.5),
    ("annoying", -0.4),
    ("poor", -0.4),
    ("broken", -0.5),
    ("bug", -0.3),
    ("bugs", -0.3),
    ("buggy", -0.4),
    ("issue", -0.2),
    ("issues", -0.2),
    ("problem", -0.3),
    ("problems", -0.3),
    ("error", -0.3),
    ("errors", -0.3),
    ("fail", -0.4),
    ("fails", -0.4),
    ("failed", -0.4),
    ("failing", -0.4),
    ("failure", -0.4),
    ("crash", -0.5),
    ("crashes", -0.5),
    ("crashed", -0.5),
    ("crashing", -0.5),
    ("slow", -0.3),
    ("confusing", -0.3),
    ("difficult", -0.3),
    ("useless", -0.6),
    ("missing", -0.2),
    ("cancel", -0.3),
    ("refund", -0.3),
];

/// Tokens that flip the polarity of a lexicon hit within the next
/// [`NEGATION_WINDOW`] tokens.
const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "wasn't", "aren't", "won't",
    "can't", "cannot", "without", "hardly",
];

const NEGATION_WINDOW: usize = 3;

/// Upper bound on lexicon confidence; lexical evidence alone never reaches
/// model-level certainty.
const MAX_CONFIDENCE: f32 = 0.9;
const BASE_CONFIDENCE: f32 = 0.2;

/// Hits at which coverage saturates.
const FULL_COVERAGE_HITS: f32 = 4.0;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|t| t.trim_matches(|c| c == '\'' || c == '\u{2019}').replace('\u{2019}', "'"))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn weight(token: &str) -> Option<f32> {
    LEXICON
        .iter()
        .find(|(word, _)| *word == token)
        .map(|&(_, w)| w)
}

/// Score `text` with the lexicon, flipping hits preceded by a negator.
///
/// # Errors
///
/// Returns [`SentimentError::MalformedText`] if `text` has no word tokens.
#[allow(clippy::cast_precision_loss)]
pub fn lexicon_polarity(text: &str) -> Result<Polarity, SentimentError> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Err(SentimentError::MalformedText(
            "text contains no words".to_owned(),
        ));
    }

    let mut positive = 0.0_f32;
    let mut negative = 0.0_f32;
    let mut hits = 0_usize;

    for (i, token) in tokens.iter().enumerate() {
        let Some(base) = weight(token) else {
            continue;
        };
        let negated = (1..=NEGATION_WINDOW)
            .any(|k| i >= k && NEGATORS.contains(&tokens[i - k].as_str()));
        let w = if negated { -base } else { base };
        if w > 0.0 {
            positive += w;
        } else {
            negative -= w;
        }
        hits += 1;
    }

    let total = positive + negative;
    let agreement = if total > 0.0 {
        (positive - negative).abs() / total
    } else {
        0.0
    };
    let coverage = (hits as f32 / FULL_COVERAGE_HITS).min(1.0);
    let confidence =
        BASE_CONFIDENCE + (MAX_CONFIDENCE - BASE_CONFIDENCE) * 0.5 * (agreement + coverage);

    Ok(Polarity::new(positive - negative, confidence.min(MAX_CONFIDENCE)))
}

/// Offline fallback classifier backed by [`LEXICON`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconClassifier;

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    async fn classify(&self, text: &str) -> Result<Polarity, SentimentError> {
        lexicon_polarity(text)
    }
}
