//! Theme extraction: vectorize, cluster, name, and snapshot memberships.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use fbp_core::{NormalizedFeedback, Theme, ThemeId, ThemeMembership, ThemeStatus};
use sha2::{Digest, Sha256};

use crate::config::ThemeConfig;
use crate::error::ThemeError;
use crate::kmeans::{kmeans, KMeansParams};
use crate::text::{terms, title_case, SurfaceForms};
use crate::tfidf::{dot, is_zero, normalize, TfidfMatrix};

/// Result of one extraction run. Memberships reference the themes of the
/// same run only.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeExtraction {
    pub generation: u64,
    /// Sorted by frequency descending, then name.
    pub themes: Vec<Theme>,
    pub memberships: Vec<ThemeMembership>,
    /// Set when no vector space or clustering could be produced. Themes
    /// and memberships are empty in that case.
    pub degraded: Option<ThemeError>,
}

impl ThemeExtraction {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            themes: Vec::new(),
            memberships: Vec::new(),
            degraded: None,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// Members of `theme_id`, most relevant first.
    #[must_use]
    pub fn members_of(&self, theme_id: ThemeId) -> Vec<&ThemeMembership> {
        let mut members: Vec<&ThemeMembership> = self
            .memberships
            .iter()
            .filter(|m| m.theme_id == theme_id)
            .collect();
        members.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        members
    }
}

/// Derive a stable theme id from its name and keywords.
#[must_use]
pub fn theme_id(name: &str, keywords: &[String]) -> ThemeId {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    for keyword in keywords {
        hasher.update([0_u8]);
        hasher.update(keyword.as_bytes());
    }
    let hash = hasher.finalize();
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    uuid::Builder::from_custom_bytes(bytes).into_uuid()
}

/// A theme before ids and collision suffixes are assigned.
struct Draft {
    name: String,
    keywords: Vec<String>,
    confidence: f32,
    /// `(record index, relevance)`.
    members: Vec<(usize, f32)>,
}

#[derive(Debug)]
pub struct ThemeExtractor {
    config: ThemeConfig,
    next_generation: AtomicU64,
}

impl ThemeExtractor {
    /// # Errors
    ///
    /// Returns [`ThemeError::InvalidParameter`] if `config` is invalid.
    pub fn new(config: ThemeConfig) -> Result<Self, ThemeError> {
        config.validate()?;
        Ok(Self {
            config,
            next_generation: AtomicU64::new(1),
        })
    }

    /// Continue numbering generations after `last` (e.g. the last persisted
    /// run).
    #[must_use]
    pub fn resume_after(self, last: u64) -> Self {
        self.next_generation.store(last + 1, Ordering::Relaxed);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ThemeConfig {
        &self.config
    }

    /// Extract up to `num_themes` themes from `records`. Themes with fewer
    /// than `min_frequency` members are dropped.
    ///
    /// Corpora smaller than `num_themes` use keyword frequency instead of
    /// clustering. If no vector space can be built the result is degraded:
    /// zero themes with [`ThemeExtraction::degraded`] set.
    pub fn extract(
        &self,
        records: &[NormalizedFeedback],
        num_themes: usize,
        min_frequency: usize,
    ) -> ThemeExtraction {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let min_frequency = min_frequency.max(1);
        if records.is_empty() || num_themes == 0 {
            return ThemeExtraction::empty(generation);
        }

        let mut forms = SurfaceForms::default();
        let documents: Vec<Vec<String>> = records
            .iter()
            .map(|r| {
                terms(&r.content)
                    .into_iter()
                    .map(|t| {
                        forms.observe(&t);
                        t.base
                    })
                    .collect()
            })
            .collect();

        let drafts = if records.len() < num_themes {
            Ok(self.keyword_drafts(&documents, &forms, num_themes, min_frequency))
        } else {
            self.cluster_drafts(&documents, &forms, num_themes, min_frequency)
        };

        let drafts = match drafts {
            Ok(drafts) => drafts,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    kind = e.kind(),
                    records = records.len(),
                    "theme extraction degraded"
                );
                return ThemeExtraction {
                    degraded: Some(e),
                    ..ThemeExtraction::empty(generation)
                };
            }
        };

        let extraction = finalize(generation, records, drafts);
        tracing::info!(
            generation,
            records = records.len(),
            themes = extraction.themes.len(),
            memberships = extraction.memberships.len(),
            "themes extracted"
        );
        extraction
    }

    /// Most frequent base terms present in at least `min_frequency` records.
    #[allow(clippy::cast_precision_loss)]
    fn keyword_drafts(
        &self,
        documents: &[Vec<String>],
        forms: &SurfaceForms,
        num_themes: usize,
        min_frequency: usize,
    ) -> Vec<Draft> {
        let mut containing: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, doc) in documents.iter().enumerate() {
            let unique: BTreeSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                containing.entry(term).or_default().push(i);
            }
        }

        let mut ranked: Vec<(&str, Vec<usize>)> = containing
            .into_iter()
            .filter(|(_, docs)| docs.len() >= min_frequency)
            .collect();
        ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        ranked.truncate(num_themes);

        tracing::debug!(
            candidates = ranked.len(),
            top_keywords = self.config.top_keywords,
            "keyword theme fallback"
        );

        // Confidence is the share of records mentioning the term.
        let total = documents.len() as f32;
        ranked
            .into_iter()
            .map(|(term, docs)| Draft {
                name: title_case(forms.display(term)),
                keywords: vec![term.to_owned()],
                confidence: docs.len() as f32 / total,
                members: docs.into_iter().map(|i| (i, 1.0)).collect(),
            })
            .collect()
    }

    fn cluster_drafts(
        &self,
        documents: &[Vec<String>],
        forms: &SurfaceForms,
        num_themes: usize,
        min_frequency: usize,
    ) -> Result<Vec<Draft>, ThemeError> {
        let matrix =
            TfidfMatrix::fit(documents, self.config.min_df, self.config.max_features)?;

        // Records with no surviving terms join no theme.
        let clustered: Vec<usize> = (0..matrix.rows.len())
            .filter(|&i| !is_zero(&matrix.rows[i]))
            .collect();
        if clustered.is_empty() {
            return Err(ThemeError::EmptyVocabulary {
                documents: documents.len(),
            });
        }
        let points: Vec<Vec<f64>> = clustered.iter().map(|&i| matrix.rows[i].clone()).collect();

        let clustering = kmeans(
            &points,
            &KMeansParams {
                k: num_themes.min(points.len()),
                max_iterations: self.config.max_iterations,
                tolerance: self.config.tolerance,
                seed: self.config.seed,
            },
        )?;

        let mut drafts = Vec::new();
        for (cluster, centroid) in clustering.centroids.iter().enumerate() {
            let members = clustering.members(cluster);
            if members.len() < min_frequency {
                tracing::debug!(
                    cluster,
                    size = members.len(),
                    min_frequency,
                    "dropping small cluster"
                );
                continue;
            }

            let mut ranked: Vec<(usize, f64)> = centroid
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, w)| *w > 0.0)
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            let keywords: Vec<String> = ranked
                .iter()
                .take(self.config.top_keywords)
                .map(|(i, _)| matrix.vocabulary[*i].clone())
                .collect();

            let mut unit = centroid.clone();
            normalize(&mut unit);
            let relevances: Vec<(usize, f32)> = members
                .iter()
                .map(|&m| {
                    #[allow(clippy::cast_possible_truncation)]
                    let similarity = dot(&points[m], &unit).clamp(0.0, 1.0) as f32;
                    (clustered[m], similarity)
                })
                .collect();
            if relevances.iter().any(|(_, s)| !s.is_finite()) {
                return Err(ThemeError::NonFinite(format!(
                    "member similarity in cluster {cluster}"
                )));
            }
            #[allow(clippy::cast_precision_loss)]
            let confidence =
                relevances.iter().map(|(_, s)| s).sum::<f32>() / relevances.len() as f32;

            drafts.push(Draft {
                name: name_from_keywords(&keywords, forms),
                keywords,
                confidence,
                members: relevances,
            });
        }

        Ok(drafts)
    }
}

/// Title-cased display forms of the top one or two keywords.
fn name_from_keywords(keywords: &[String], forms: &SurfaceForms) -> String {
    match keywords {
        [] => "General Feedback".to_owned(),
        [only] => title_case(forms.display(only)),
        [first, second, ..] => format!(
            "{} & {}",
            title_case(forms.display(first)),
            title_case(forms.display(second))
        ),
    }
}

/// Order drafts, disambiguate names, assign ids and build the snapshot.
fn finalize(generation: u64, records: &[NormalizedFeedback], drafts: Vec<Draft>) -> ThemeExtraction {
    let mut drafts = drafts;
    drafts.sort_by(|a, b| {
        b.members
            .len()
            .cmp(&a.members.len())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.keywords.cmp(&b.keywords))
    });

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut themes = Vec::with_capacity(drafts.len());
    let mut memberships = Vec::new();

    for draft in drafts {
        let occurrence = seen.entry(draft.name.clone()).or_insert(0);
        *occurrence += 1;
        let name = if *occurrence == 1 {
            draft.name
        } else {
            format!("{} ({occurrence})", draft.name)
        };

        let id = theme_id(&name, &draft.keywords);
        let (first_seen, last_seen) = span(records, &draft.members);
        let frequency = draft.members.len();

        memberships.extend(draft.members.iter().map(|&(i, relevance)| ThemeMembership {
            theme_id: id,
            feedback_id: records[i].id,
            relevance,
        }));
        themes.push(Theme {
            id,
            name,
            keywords: draft.keywords,
            frequency,
            confidence: draft.confidence.clamp(0.0, 1.0),
            first_seen,
            last_seen,
            status: ThemeStatus::Active,
            empty_runs: 0,
            history: vec![frequency],
        });
    }

    ThemeExtraction {
        generation,
        themes,
        memberships,
        degraded: None,
    }
}

/// Earliest and latest `created_at` among members.
fn span(records: &[NormalizedFeedback], members: &[(usize, f32)]) -> (DateTime<Utc>, DateTime<Utc>) {
    let mut times = members.iter().map(|&(i, _)| records[i].created_at);
    let first = times.next().unwrap_or(DateTime::<Utc>::MIN_UTC);
    times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)))
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
