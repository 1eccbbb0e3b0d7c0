//! Relevance scoring and selection.
//!
//! An article's score is `keyword_hits * 2 + category_weight + jitter`:
//!
//! - `keyword_hits` counts how many priority keywords appear in the
//!   lower-cased title and summary. A keyword counts once no matter how
//!   often it occurs.
//! - `category_weight` comes from the configured mapping, defaulting to `1`.
//! - `jitter` is drawn from `[0, 0.5)` on every call so that runs with
//!   similar score distributions do not always favour the same feeds.
//!
//! The random source is passed in, so callers decide whether scoring is
//! reproducible.

use crate::models::Article;
use itertools::Itertools;
use rand::Rng;
use std::collections::BTreeMap;

const KEYWORD_WEIGHT: f64 = 2.0;
const DEFAULT_CATEGORY_WEIGHT: f64 = 1.0;
const MAX_JITTER: f64 = 0.5;

/// Priority keywords lower-cased once for repeated matching.
#[derive(Debug, Clone)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        Self(keywords.iter().map(|k| k.as_ref().to_lowercase()).collect())
    }

    /// Number of keywords that occur in `text` (already lower-cased).
    pub fn hits(&self, text: &str) -> usize {
        self.0.iter().filter(|k| !k.is_empty() && text.contains(k.as_str())).count()
    }
}

/// Score without jitter.
pub fn base_score(
    article: &Article,
    keywords: &KeywordSet,
    category_weights: &BTreeMap<String, f64>,
) -> f64 {
    let text = format!("{} {}", article.title, article.raw_summary).to_lowercase();
    let hits = keywords.hits(&text) as f64;
    let weight = category_weights
        .get(&article.category)
        .copied()
        .unwrap_or(DEFAULT_CATEGORY_WEIGHT);
    hits * KEYWORD_WEIGHT + weight
}

/// Score with a fresh jitter draw from `rng`.
pub fn score<R: Rng + ?Sized>(
    article: &Article,
    keywords: &KeywordSet,
    category_weights: &BTreeMap<String, f64>,
    rng: &mut R,
) -> f64 {
    base_score(article, keywords, category_weights) + rng.random_range(0.0..MAX_JITTER)
}

/// Fill in `score` on every article.
pub fn score_all<R: Rng + ?Sized>(
    articles: &mut [Article],
    keywords: &KeywordSet,
    category_weights: &BTreeMap<String, f64>,
    rng: &mut R,
) {
    for article in articles.iter_mut() {
        article.score = score(article, keywords, category_weights, rng);
    }
}

/// The `count` highest-scoring articles, best first.
///
/// The sort is stable, so equal scores keep their arrival order. The input
/// slice is left as it was.
pub fn select(articles: &[Article], count: usize) -> Vec<Article> {
    articles
        .iter()
        .sorted_by(|a, b| b.score.total_cmp(&a.score))
        .take(count)
        .cloned()
        .collect()
}
