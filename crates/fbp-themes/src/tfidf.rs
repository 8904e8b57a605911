//! TF-IDF vectorization with a smoothed IDF and L2-normalized rows.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ThemeError;

/// Corpora smaller than this ignore `min_df` and keep every term.
pub const SMALL_CORPUS: usize = 10;

/// A fitted vector space: alphabetical vocabulary plus one dense row per
/// document.
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfMatrix {
    pub vocabulary: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl TfidfMatrix {
    /// Fit the vocabulary on `documents` (already preprocessed into base
    /// forms) and vectorize them.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::EmptyVocabulary`] if no term survives the
    /// document-frequency and feature limits.
    pub fn fit(
        documents: &[Vec<String>],
        min_df: usize,
        max_features: usize,
    ) -> Result<Self, ThemeError> {
        let n = documents.len();
        let min_df = if n < SMALL_CORPUS { 1 } else { min_df.max(1) };

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        let mut corpus_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in documents {
            let unique: BTreeSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_default() += 1;
            }
            for term in doc {
                *corpus_frequency.entry(term.as_str()).or_default() += 1;
            }
        }

        let mut candidates: Vec<(&str, usize)> = document_frequency
            .iter()
            .filter(|(_, df)| **df >= min_df)
            .map(|(term, _)| (*term, corpus_frequency.get(term).copied().unwrap_or(0)))
            .collect();
        // Highest corpus frequency first; BTreeMap order already breaks ties
        // alphabetically and the sort is stable.
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.truncate(max_features);

        let mut vocabulary: Vec<String> = candidates.iter().map(|(t, _)| (*t).to_owned()).collect();
        vocabulary.sort();

        if vocabulary.is_empty() {
            return Err(ThemeError::EmptyVocabulary { documents: n });
        }

        let index: BTreeMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| {
                let df = document_frequency.get(term.as_str()).copied().unwrap_or(0);
                ((1.0 + n as f64) / (1.0 + df as f64)).ln() + 1.0
            })
            .collect();

        let rows = documents
            .iter()
            .map(|doc| {
                let mut row = vec![0.0; vocabulary.len()];
                for term in doc {
                    if let Some(&i) = index.get(term.as_str()) {
                        row[i] += 1.0;
                    }
                }
                for (value, weight) in row.iter_mut().zip(&idf) {
                    *value *= weight;
                }
                normalize(&mut row);
                row
            })
            .collect();

        Ok(Self { vocabulary, rows })
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Scale `v` to unit length in place. Zero vectors are left unchanged.
pub fn normalize(v: &mut [f64]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[must_use]
pub fn is_zero(v: &[f64]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Cosine similarity; zero if either vector is zero.
#[must_use]
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let denom = dot(a, a).sqrt() * dot(b, b).sqrt();
    if denom > 0.0 {
        dot(a, b) / denom
    } else {
        0.0
    }
}
