use crate::cache::{CacheKey, QueryCache};
use crate::index::{Index, TitleIndex};
use crate::metrics::SearchMetrics;
use crate::tokenizer::Tokenizer;
use crate::DocId;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use thiserror::Error;

/// Applied when every query term appears in the document's title.
const FULL_TITLE_BOOST: f32 = 10.0;
/// Applied when some, but not all, query terms appear in the title.
const PARTIAL_TITLE_BOOST: f32 = 2.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("result limit must be at least 1, got {0}")]
    InvalidLimit(usize),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache_capacity: usize,
    /// Default for the `strict` query parameter at the serving boundary.
    pub default_strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 500,
            default_strict: false,
        }
    }
}

/// Vector-space ranking over a loaded [`Index`]. The index and title index are
/// read-only after construction, so any number of threads may call
/// [`SearchEngine::search`] concurrently; the cache and metrics carry their
/// own locking.
pub struct SearchEngine {
    index: Index,
    title_index: TitleIndex,
    tokenizer: Tokenizer,
    cache: QueryCache,
    metrics: SearchMetrics,
    config: EngineConfig,
}

impl SearchEngine {
    pub fn new(index: Index, title_index: TitleIndex, config: EngineConfig) -> Self {
        let tokenizer = Tokenizer::new(index.stopwords.clone());
        let cache = QueryCache::new(config.cache_capacity);
        Self {
            index,
            title_index,
            tokenizer,
            cache,
            metrics: SearchMetrics::default(),
            config,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ranked search: up to `k` `(doc_id, score)` pairs, scores descending in
    /// `[0, 1)`. A query that matches nothing is an empty `Ok`, not an error;
    /// only a non-positive `k` is rejected.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        strict: bool,
    ) -> Result<Vec<(DocId, f32)>, SearchError> {
        if k == 0 {
            return Err(SearchError::InvalidLimit(k));
        }

        let started = Instant::now();
        let key = CacheKey {
            query: query.to_string(),
            k,
            strict,
        };
        if let Some(hit) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            self.metrics.record_search(started.elapsed(), hit.len());
            return Ok(hit);
        }

        let results = self.rank(query, k, strict);
        self.metrics.record_search(started.elapsed(), results.len());
        self.cache.put(key, results.clone());
        Ok(results)
    }

    fn rank(&self, query: &str, k: usize, strict: bool) -> Vec<(DocId, f32)> {
        // Query-side term frequencies, restricted to terms the index knows.
        let mut tf_query: HashMap<String, u32> = HashMap::new();
        for term in self.tokenizer.tokenize(query) {
            if self.index.entries.contains_key(&term) {
                *tf_query.entry(term).or_insert(0) += 1;
            }
        }
        if tf_query.is_empty() {
            return Vec::new();
        }
        let found_terms: Vec<&str> = tf_query.keys().map(String::as_str).collect();

        let candidates = if strict {
            self.intersect_candidates(&found_terms)
        } else {
            self.union_candidates(&found_terms)
        };
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut query_vector: HashMap<&str, f32> = HashMap::new();
        for (term, tf) in &tf_query {
            let idf = self.index.entries[term.as_str()].idf;
            query_vector.insert(term.as_str(), *tf as f32 * idf);
        }
        let query_magnitude = query_vector
            .values()
            .map(|w| w * w)
            .sum::<f32>()
            .sqrt();
        if query_magnitude == 0.0 {
            return Vec::new();
        }

        let mut scored: Vec<(DocId, f32)> = Vec::new();
        for doc_id in candidates {
            // A document missing its magnitude is skipped, never a failure.
            let doc_magnitude = match self.index.magnitude(doc_id) {
                Some(m) if m > 0.0 => m,
                _ => continue,
            };

            let mut dot = 0.0f32;
            for (term, query_weight) in &query_vector {
                if let Some(weight) = self.doc_weight(term, doc_id) {
                    dot += query_weight * weight;
                }
            }
            if dot == 0.0 {
                continue;
            }

            let mut score = dot / (query_magnitude * doc_magnitude);
            let title_matches = found_terms
                .iter()
                .filter(|term| self.title_index.contains(term, doc_id))
                .count();
            if title_matches == found_terms.len() {
                score *= FULL_TITLE_BOOST;
            } else if title_matches > 0 {
                score *= PARTIAL_TITLE_BOOST;
            }

            // tanh squashes the boosted score into [0, 1).
            scored.push((doc_id, (score.tanh() + 1.0) / 2.0));
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// Documents containing *all* terms. Evaluated from the shortest posting
    /// list outward and short-circuited once the running intersection drains.
    fn intersect_candidates(&self, terms: &[&str]) -> HashSet<DocId> {
        let mut ordered: Vec<&str> = terms.to_vec();
        ordered.sort_by_key(|term| self.index.entries[*term].postings.len());

        let mut iter = ordered.into_iter();
        let mut acc: HashSet<DocId> = match iter.next() {
            Some(term) => self.posting_docs(term),
            None => return HashSet::new(),
        };
        for term in iter {
            if acc.is_empty() {
                break;
            }
            let docs = self.posting_docs(term);
            acc.retain(|doc_id| docs.contains(doc_id));
        }
        acc
    }

    /// Documents containing *any* term.
    fn union_candidates(&self, terms: &[&str]) -> HashSet<DocId> {
        let mut acc = HashSet::new();
        for term in terms {
            acc.extend(self.posting_docs(term));
        }
        acc
    }

    fn posting_docs(&self, term: &str) -> HashSet<DocId> {
        self.index.entries[term]
            .postings
            .iter()
            .map(|p| p.doc_id)
            .collect()
    }

    /// The document's stored weight for `term`, if it has a posting. Postings
    /// are ordered by doc_id, so this is a binary search.
    fn doc_weight(&self, term: &str, doc_id: DocId) -> Option<f32> {
        let postings = &self.index.entries[term].postings;
        postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| postings[i].weight)
    }
}
