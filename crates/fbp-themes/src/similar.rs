//! Near-duplicate grouping of feedback by TF-IDF cosine similarity.

use fbp_core::NormalizedFeedback;

use crate::config::ThemeConfig;
use crate::text::preprocess;
use crate::tfidf::{dot, TfidfMatrix};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Group records whose content is at least `threshold` cosine-similar.
///
/// Greedy in input order: each ungrouped record starts a group and pulls in
/// every later ungrouped record similar to it. Every index appears in
/// exactly one group. If no vector space can be built, every record is its
/// own group.
#[must_use]
pub fn group_similar(
    records: &[NormalizedFeedback],
    config: &ThemeConfig,
    threshold: f64,
) -> Vec<Vec<usize>> {
    let singletons = || -> Vec<Vec<usize>> { (0..records.len()).map(|i| vec![i]).collect() };
    if records.len() < 2 {
        return singletons();
    }

    let documents: Vec<Vec<String>> = records.iter().map(|r| preprocess(&r.content)).collect();
    let matrix = match TfidfMatrix::fit(&documents, config.min_df, config.max_features) {
        Ok(matrix) => matrix,
        Err(e) => {
            tracing::warn!(error = %e, records = records.len(), "similarity grouping skipped");
            return singletons();
        }
    };

    let mut grouped = vec![false; records.len()];
    let mut groups = Vec::new();
    for i in 0..records.len() {
        if grouped[i] {
            continue;
        }
        grouped[i] = true;
        let mut group = vec![i];
        for j in (i + 1)..records.len() {
            // Rows are unit length, so the dot product is the cosine.
            if !grouped[j] && dot(&matrix.rows[i], &matrix.rows[j]) >= threshold {
                grouped[j] = true;
                group.push(j);
            }
        }
        groups.push(group);
    }
    groups
}

/// Number of other records in each record's group, indexed like the input.
#[must_use]
pub fn duplicate_counts(groups: &[Vec<usize>], len: usize) -> Vec<usize> {
    let mut counts = vec![0; len];
    for group in groups {
        for &i in group {
            if let Some(count) = counts.get_mut(i) {
                *count = group.len() - 1;
            }
        }
    }
    counts
}
