use crate::docs::DocMeta;
use crate::tokenizer::Tokenizer;
use crate::DocId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The pipeline shards the index into this many partition files.
pub const PARTITION_COUNT: usize = 3;

/// Zero-padded partition file name, `part-00000` .. `part-00002`.
pub fn partition_file_name(partition: usize) -> String {
    format!("part-{partition:05}")
}

/// Fatal load-time failures. The engine must never serve against a partially
/// loaded index, so none of these are recoverable.
#[derive(Debug, Error)]
pub enum IndexLoadError {
    #[error("missing index partition {}", .path.display())]
    MissingPartition {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing stopwords file {}", .path.display())]
    MissingStopwords {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{line}: {reason}", .file.display())]
    MalformedLine {
        file: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("reading {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One `(term, document)` record. `weight` is the document's tf-idf component
/// for the term; `norm` is the per-document partial norm the pipeline persists
/// alongside it. The loader recomputes full document magnitudes (see
/// [`Index::doc_magnitude`]), which supersede `norm` at query time.
#[derive(Debug, Clone, Serialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32,
    pub norm: f32,
}

/// A term's slice of the index. Postings are ordered by `doc_id` and immutable
/// once [`Index::load`] returns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexEntry {
    pub idf: f32,
    pub postings: Vec<Posting>,
}

/// In-memory inverted index. Built once by [`Index::load`] (or
/// [`Index::from_entries`] in tests), read-only afterwards, so concurrent
/// searches share it without locking.
#[derive(Debug, Default)]
pub struct Index {
    pub entries: HashMap<String, IndexEntry>,
    pub stopwords: HashSet<String>,
    /// Full vector magnitude per document: `sqrt(sum of weight^2)` over every
    /// posting that references the document.
    pub doc_magnitude: HashMap<DocId, f32>,
}

impl Index {
    /// Load the three partition files from `index_dir` plus the stopword file.
    /// Any missing file or malformed line aborts the load; malformed lines are
    /// reported with their file and line number.
    pub fn load(index_dir: &Path, stopwords_path: &Path) -> Result<Self, IndexLoadError> {
        let stopwords = read_stopwords(stopwords_path)?;

        let mut entries: HashMap<String, IndexEntry> = HashMap::new();
        for partition in 0..PARTITION_COUNT {
            let path = index_dir.join(partition_file_name(partition));
            load_partition(&path, &mut entries)?;
        }

        let index = Self::from_entries(entries, stopwords);
        tracing::info!(
            terms = index.entries.len(),
            docs = index.doc_magnitude.len(),
            "index loaded"
        );
        Ok(index)
    }

    /// Freeze parsed entries into a queryable index: order postings by doc_id
    /// and derive every document's magnitude in one pass.
    pub fn from_entries(
        mut entries: HashMap<String, IndexEntry>,
        stopwords: HashSet<String>,
    ) -> Self {
        let mut squared: HashMap<DocId, f32> = HashMap::new();
        for entry in entries.values_mut() {
            entry.postings.sort_by_key(|p| p.doc_id);
            for posting in &entry.postings {
                *squared.entry(posting.doc_id).or_insert(0.0) += posting.weight * posting.weight;
            }
        }
        let doc_magnitude = squared.into_iter().map(|(d, s)| (d, s.sqrt())).collect();
        Self {
            entries,
            stopwords,
            doc_magnitude,
        }
    }

    pub fn entry(&self, term: &str) -> Option<&IndexEntry> {
        self.entries.get(term)
    }

    pub fn magnitude(&self, doc_id: DocId) -> Option<f32> {
        self.doc_magnitude.get(&doc_id).copied()
    }

    pub fn term_count(&self) -> usize {
        self.entries.len()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_magnitude.len()
    }
}

fn read_stopwords(path: &Path) -> Result<HashSet<String>, IndexLoadError> {
    let file = File::open(path).map_err(|source| IndexLoadError::MissingStopwords {
        path: path.to_path_buf(),
        source,
    })?;
    let mut stopwords = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| IndexLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let word = line.trim();
        if !word.is_empty() {
            stopwords.insert(word.to_string());
        }
    }
    Ok(stopwords)
}

fn load_partition(
    path: &Path,
    entries: &mut HashMap<String, IndexEntry>,
) -> Result<(), IndexLoadError> {
    let file = File::open(path).map_err(|source| IndexLoadError::MissingPartition {
        path: path.to_path_buf(),
        source,
    })?;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| IndexLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_line(&line, entries).map_err(|reason| IndexLoadError::MalformedLine {
            file: path.to_path_buf(),
            line: line_no + 1,
            reason,
        })?;
    }
    Ok(())
}

/// Parse one partition line: `<term> <idf> (<doc_id> <weight> <norm>)*`.
fn parse_line(line: &str, entries: &mut HashMap<String, IndexEntry>) -> Result<(), String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(format!("expected at least 2 fields, found {}", fields.len()));
    }

    let term = fields[0];
    let idf: f32 = fields[1]
        .parse()
        .map_err(|_| format!("non-numeric idf {:?}", fields[1]))?;

    let trailing = &fields[2..];
    if trailing.len() % 3 != 0 {
        return Err(format!(
            "incomplete posting group: {} trailing fields is not a multiple of 3",
            trailing.len()
        ));
    }

    let entry = entries.entry(term.to_string()).or_default();
    entry.idf = idf;
    for triple in trailing.chunks_exact(3) {
        let doc_id: DocId = triple[0]
            .parse()
            .map_err(|_| format!("non-numeric doc_id {:?}", triple[0]))?;
        let weight: f32 = triple[1]
            .parse()
            .map_err(|_| format!("non-numeric weight {:?}", triple[1]))?;
        let norm: f32 = triple[2]
            .parse()
            .map_err(|_| format!("non-numeric norm {:?}", triple[2]))?;
        entry.postings.push(Posting {
            doc_id,
            weight,
            norm,
        });
    }
    Ok(())
}

/// Maps a term to the set of documents whose *title* contains it. Consulted
/// only when scoring (title-match boost), never for retrieval.
#[derive(Default)]
pub struct TitleIndex {
    terms: HashMap<String, HashSet<DocId>>,
}

impl TitleIndex {
    pub fn build(docs: &HashMap<DocId, DocMeta>, tokenizer: &Tokenizer) -> Self {
        let mut terms: HashMap<String, HashSet<DocId>> = HashMap::new();
        for (doc_id, meta) in docs {
            for term in tokenizer.tokenize(&meta.title) {
                terms.entry(term).or_default().insert(*doc_id);
            }
        }
        Self { terms }
    }

    pub fn contains(&self, term: &str, doc_id: DocId) -> bool {
        self.terms
            .get(term)
            .map(|docs| docs.contains(&doc_id))
            .unwrap_or(false)
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(line: &str) -> Result<HashMap<String, IndexEntry>, String> {
        let mut entries = HashMap::new();
        parse_line(line, &mut entries)?;
        Ok(entries)
    }

    #[test]
    fn parses_term_with_postings() {
        let entries = parse_one("dune 0.30103 1 0.60206 0.3625 4 0.30103 0.0906").unwrap();
        let entry = &entries["dune"];
        assert_eq!(entry.postings.len(), 2);
        assert_eq!(entry.postings[0].doc_id, 1);
        assert!((entry.idf - 0.30103).abs() < 1e-6);
    }

    #[test]
    fn rejects_short_line() {
        assert!(parse_one("dune").is_err());
    }

    #[test]
    fn rejects_incomplete_posting_group() {
        assert!(parse_one("dune 0.3 1 0.5").is_err());
    }

    #[test]
    fn rejects_non_numeric_fields() {
        assert!(parse_one("dune abc").is_err());
        assert!(parse_one("dune 0.3 one 0.5 0.2").is_err());
    }

    #[test]
    fn magnitude_matches_postings() {
        let mut entries: HashMap<String, IndexEntry> = HashMap::new();
        parse_line("spice 0.5 7 3.0 0.0", &mut entries).unwrap();
        parse_line("worm 0.5 7 4.0 0.0", &mut entries).unwrap();
        let index = Index::from_entries(entries, HashSet::new());
        assert!((index.magnitude(7).unwrap() - 5.0).abs() < 1e-6);
    }
}
