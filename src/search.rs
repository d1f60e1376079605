//! Fuzzy search over the links table.
//!
//! A single cached index is built lazily from a full table scan and thrown
//! away whenever links or collections change. Rebuilds are full scans: at
//! personal-bookmark scale a linear rebuild is cheaper than getting
//! incremental index maintenance wrong.

use crate::store::{Database, Link};
use nucleo_matcher::{
    pattern::{AtomKind, CaseMatching, Normalization, Pattern},
    Config, Matcher, Utf32Str,
};
use serde::Serialize;
use std::{sync::Mutex, time::Instant};

/// Field weights; a match in a heavier field ranks the link higher.
const W_TITLE: f32 = 0.7;
const W_COLLECTION_NAME: f32 = 0.5;
const W_DOMAIN: f32 = 0.4;
const W_URL: f32 = 0.3;
const W_DESCRIPTION: f32 = 0.2;
const W_META_TEXT: f32 = 0.1;

/// Floor for per-field distances so an exact match never zeroes the
/// weighted product.
const MIN_FIELD_DISTANCE: f32 = 0.001;

struct IndexEntry {
    link: Link,
    /// (weight, lowercased text) for every non-empty searchable field.
    fields: Vec<(f32, String)>,
}

struct IndexState {
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
struct MetricsInner {
    total_searches: u64,
    total_time_ms: f64,
    last_search_time_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetrics {
    pub total_searches: u64,
    pub total_time_ms: f64,
    pub last_search_time_ms: f64,
    pub average_time_ms: f64,
}

/// Weighted fuzzy index over all links, with a single-slot cache and
/// query-time metrics. Owned by the engine root, never a module global.
pub struct SearchIndex {
    threshold: f32,
    slot: Mutex<Option<IndexState>>,
    metrics: Mutex<MetricsInner>,
}

impl SearchIndex {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            slot: Mutex::new(None),
            metrics: Mutex::new(MetricsInner::default()),
        }
    }

    /// Drop the cached index; the next query rebuilds from the store.
    pub fn invalidate(&self) {
        *self.slot.lock().unwrap() = None;
    }

    /// Build a fresh index from a full scan, replacing whatever is cached.
    pub fn rebuild(&self, db: &Database) {
        let state = build(db);
        log::debug!("search index rebuilt over {} links", state.entries.len());
        *self.slot.lock().unwrap() = Some(state);
    }

    /// Invalidate-and-rebuild; every link/collection mutation ends here.
    pub fn refresh(&self, db: &Database) {
        self.invalidate();
        self.rebuild(db);
    }

    /// Up to `limit` links ordered best-match-first. No matches is an empty
    /// vec, never an error. Ties break on link id so an unchanged index
    /// answers identical queries with identical sequences.
    pub fn query(&self, db: &Database, text: &str, limit: usize) -> Vec<Link> {
        let started = Instant::now();

        let hits = {
            let mut slot = self.slot.lock().unwrap();
            let state = slot.get_or_insert_with(|| build(db));
            score(state, text, self.threshold, limit)
        };

        self.record(started.elapsed().as_secs_f64() * 1000.0);
        hits
    }

    fn record(&self, elapsed_ms: f64) {
        let mut metrics = self.metrics.lock().unwrap();
        metrics.total_searches += 1;
        metrics.total_time_ms += elapsed_ms;
        metrics.last_search_time_ms = elapsed_ms;
    }

    pub fn metrics(&self) -> SearchMetrics {
        let metrics = self.metrics.lock().unwrap();
        SearchMetrics {
            total_searches: metrics.total_searches,
            total_time_ms: metrics.total_time_ms,
            last_search_time_ms: metrics.last_search_time_ms,
            average_time_ms: if metrics.total_searches == 0 {
                0.0
            } else {
                metrics.total_time_ms / metrics.total_searches as f64
            },
        }
    }
}

fn build(db: &Database) -> IndexState {
    let entries = db
        .links()
        .into_iter()
        .map(|link| IndexEntry {
            fields: entry_fields(&link),
            link,
        })
        .collect();
    IndexState { entries }
}

fn entry_fields(link: &Link) -> Vec<(f32, String)> {
    let mut fields = Vec::with_capacity(6);

    let mut push = |weight: f32, text: Option<&str>| {
        if let Some(text) = text {
            if !text.is_empty() {
                fields.push((weight, text.to_lowercase()));
            }
        }
    };

    push(W_TITLE, link.title.as_deref());
    push(W_COLLECTION_NAME, Some(&link.collection_name));
    push(W_DOMAIN, link.domain.as_deref());
    push(W_URL, Some(&link.url));
    push(W_DESCRIPTION, link.description.as_deref());
    push(W_META_TEXT, link.meta_text.as_deref());

    fields
}

/// A field matches when its distance (1 − similarity) stays within the
/// threshold; similarity is 1.0 for a plain substring hit, otherwise the
/// fuzzy score normalized by the pattern's self-match score. Matching links
/// are ranked by the product of `distance^weight` over their matching
/// fields, so heavier fields pull the score down harder.
fn score(state: &IndexState, text: &str, threshold: f32, limit: usize) -> Vec<Link> {
    let query = text.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let query_lower = query.to_lowercase();
    let pattern = Pattern::new(
        query,
        CaseMatching::Ignore,
        Normalization::Smart,
        AtomKind::Fuzzy,
    );
    let mut matcher = Matcher::new(Config::DEFAULT);
    let mut utf32buf = Vec::new();

    let ceiling = pattern
        .score(Utf32Str::new(&query_lower, &mut utf32buf), &mut matcher)
        .unwrap_or(1)
        .max(1) as f32;

    let mut hits: Vec<(f32, &Link)> = Vec::new();
    for entry in &state.entries {
        let mut item_score = 1.0f32;
        let mut matched = false;

        for (weight, field) in &entry.fields {
            let similarity = if field.contains(&query_lower) {
                1.0
            } else {
                match pattern.score(Utf32Str::new(field, &mut utf32buf), &mut matcher) {
                    Some(s) => (s as f32 / ceiling).min(1.0),
                    None => continue,
                }
            };

            let distance = (1.0 - similarity).max(MIN_FIELD_DISTANCE);
            if distance > threshold {
                continue;
            }

            item_score *= distance.powf(*weight);
            matched = true;
        }

        if matched {
            hits.push((item_score, &entry.link));
        }
    }

    hits.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.id.cmp(&b.1.id))
    });

    hits.into_iter()
        .take(limit)
        .map(|(_, link)| link.clone())
        .collect()
}
