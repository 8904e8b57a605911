//! Tokenization, stop-word filtering, and suffix-stripping to base forms.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

const MIN_TOKEN_CHARS: usize = 3;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{Alphabetic}\p{N}]+").expect("valid regex"));

/// English stop-words plus filler common in support conversations.
const STOP_WORDS: &[&str] = &[
    // English
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are", "aren't",
    "because", "been", "before", "being", "below", "between", "both", "but", "can", "cannot",
    "could", "did", "does", "doing", "down", "during", "each", "even", "every", "few", "for",
    "from", "further", "had", "has", "have", "having", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "into", "its", "itself", "just", "let", "more", "most", "much",
    "must", "myself", "nor", "not", "now", "off", "once", "one", "only", "other", "our", "ours",
    "ourselves", "out", "over", "own", "same", "she", "should", "some", "such", "than", "that",
    "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "too", "under", "until", "very", "was", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "yet", "you", "your",
    "yours", "yourself", "yourselves",
    // Feedback filler
    "able", "anyone", "anything", "hello", "hey", "please", "thank", "thanks", "team", "get",
    "got", "getting", "really", "still", "seems", "since", "today", "yesterday", "tried",
    "trying", "way", "know", "like", "want", "need", "use", "using", "used", "make", "see",
    "someone", "something", "thing", "things", "issue", "issues", "problem", "problems",
];

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

#[must_use]
pub fn is_stop_word(token: &str) -> bool {
    STOP_SET.contains(token)
}

/// Collapse a trailing doubled consonant left by suffix stripping
/// (`stopp` → `stop`).
fn undouble(stem: &str) -> &str {
    let mut chars = stem.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if a == b && !"aeiouls".contains(a) => &stem[..stem.len() - a.len_utf8()],
        _ => stem,
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Reduce a lowercase word to a base form by stripping one common suffix.
///
/// Deterministic and dictionary-free; the result is only used as a
/// grouping key, not shown verbatim.
#[must_use]
pub fn stem(word: &str) -> String {
    if let Some(base) = word.strip_suffix("ies") {
        if char_len(base) >= 2 {
            return format!("{base}y");
        }
    }
    if let Some(base) = word.strip_suffix("ing") {
        if char_len(base) >= MIN_TOKEN_CHARS {
            return undouble(base).to_owned();
        }
    }
    if let Some(base) = word.strip_suffix("ed") {
        if char_len(base) >= MIN_TOKEN_CHARS {
            return undouble(base).to_owned();
        }
    }
    if let Some(base) = word.strip_suffix("es") {
        if ["s", "x", "z", "ch", "sh"].iter().any(|s| base.ends_with(s))
            && char_len(base) >= MIN_TOKEN_CHARS
        {
            return base.to_owned();
        }
    }
    if let Some(base) = word.strip_suffix("ly") {
        if char_len(base) >= MIN_TOKEN_CHARS {
            return base.to_owned();
        }
    }
    if let Some(base) = word.strip_suffix('s') {
        if !(base.ends_with('s') || base.ends_with('u') || base.ends_with('i'))
            && char_len(base) >= MIN_TOKEN_CHARS
        {
            return base.to_owned();
        }
    }
    word.to_owned()
}

/// One word after filtering: its base form and the surface form it came
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub base: String,
    pub surface: String,
}

/// Lowercase, tokenize, drop short, numeric and stop-word tokens, and stem.
#[must_use]
pub fn terms(text: &str) -> Vec<Term> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| char_len(t) >= MIN_TOKEN_CHARS)
        .filter(|t| !t.chars().all(char::is_numeric))
        .filter(|t| !is_stop_word(t))
        .filter_map(|t| {
            let base = stem(t);
            (char_len(&base) >= MIN_TOKEN_CHARS && !is_stop_word(&base)).then(|| Term {
                base,
                surface: t.to_owned(),
            })
        })
        .collect()
}

/// Base forms only.
#[must_use]
pub fn preprocess(text: &str) -> Vec<String> {
    terms(text).into_iter().map(|t| t.base).collect()
}

/// Most frequent surface form per base form, ties broken alphabetically.
#[derive(Debug, Default)]
pub struct SurfaceForms {
    counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl SurfaceForms {
    pub fn observe(&mut self, term: &Term) {
        *self
            .counts
            .entry(term.base.clone())
            .or_default()
            .entry(term.surface.clone())
            .or_default() += 1;
    }

    /// Display form for `base`; falls back to `base` itself.
    #[must_use]
    pub fn display<'a>(&'a self, base: &'a str) -> &'a str {
        self.counts
            .get(base)
            .and_then(|forms| {
                forms
                    .iter()
                    .max_by(|(a_form, a), (b_form, b)| a.cmp(b).then_with(|| b_form.cmp(a_form)))
                    .map(|(form, _)| form.as_str())
            })
            .unwrap_or(base)
    }
}

/// Uppercase the first letter of each whitespace-separated word.
#[must_use]
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_common_suffixes() {
        assert_eq!(stem("crashes"), "crash");
        assert_eq!(stem("replies"), "reply");
        assert_eq!(stem("loading"), "load");
        assert_eq!(stem("stopped"), "stop");
        assert_eq!(stem("passwords"), "password");
        assert_eq!(stem("slowly"), "slow");
        assert_eq!(stem("status"), "status");
        assert_eq!(stem("access"), "access");
        assert_eq!(stem("billing"), "bill");
    }

    #[test]
    fn filters_short_numeric_and_stop_words() {
        let tokens = preprocess("The app crashed 3 times at 10:45, please fix the login page!");
        assert_eq!(tokens, vec!["app", "crash", "time", "fix", "login", "page"]);
    }

    #[test]
    fn tokenizes_on_non_alphanumerics() {
        assert_eq!(preprocess("export-to-csv/excel"), vec!["export", "csv", "excel"]);
    }

    #[test]
    fn surface_form_prefers_most_frequent_then_alphabetical() {
        let mut forms = SurfaceForms::default();
        for word in ["crashes", "crashing", "crashes"] {
            for term in terms(word) {
                forms.observe(&term);
            }
        }
        assert_eq!(forms.display("crash"), "crashes");

        let mut tie = SurfaceForms::default();
        for word in ["loading", "loaded"] {
            for term in terms(word) {
                tie.observe(&term);
            }
        }
        assert_eq!(tie.display("load"), "loaded");
        assert_eq!(tie.display("unknown"), "unknown");
    }

    #[test]
    fn title_cases_words() {
        assert_eq!(title_case("login"), "Login");
        assert_eq!(title_case("dark mode"), "Dark Mode");
    }
}
