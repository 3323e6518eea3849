//! The offline indexing pipeline: a sequence of key-grouped aggregation
//! stages that turn crawled `(doc_id, title, url, body)` rows into the three
//! scored partition files the query engine loads.
//!
//! Between every pair of stages sits [`group_by_key`], standing in for the
//! external sort/merge collaborator: it only guarantees that all records
//! sharing a key arrive contiguously. Stages never rely on order across keys.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use wikisearch_core::docs::{save_docs, DocMeta};
use wikisearch_core::index::{partition_file_name, PARTITION_COUNT};
use wikisearch_core::tokenizer::Tokenizer;
use wikisearch_core::DocId;

const SUMMARY_CHARS: usize = 200;

/// One row of the crawled corpus CSV.
#[derive(Debug, Deserialize)]
pub struct InputDoc {
    pub doc_id: DocId,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    pub body: String,
}

/// Stage 1 output: one record per term occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct TermDocCount {
    pub term: String,
    pub doc_id: DocId,
    pub count: u32,
}

/// Stage 2 output: occurrence counts summed into a term frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct TermDocTf {
    pub term: String,
    pub doc_id: DocId,
    pub tf: u32,
}

/// Stage 3 output: term weighted against the corpus, keyed by document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocTermWeight {
    pub doc_id: DocId,
    pub term: String,
    pub idf: f32,
    pub tf: u32,
    pub weight: f32,
}

/// Stage 4 output: weight plus the document's accumulated partial norm,
/// ready to be laid out into a partition line.
#[derive(Debug, Clone, PartialEq)]
pub struct TermPosting {
    pub term: String,
    pub idf: f32,
    pub doc_id: DocId,
    pub weight: f32,
    pub norm: f32,
}

/// Sort-by-key shim for the external key-grouping step. Records sharing a key
/// come out contiguous; order within a group is not part of the contract.
fn group_by_key<T, K>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<Vec<T>>
where
    K: Ord,
{
    rows.sort_by_cached_key(|row| key(row));
    let mut groups: Vec<Vec<T>> = Vec::new();
    for row in rows {
        match groups.last_mut() {
            Some(group) if key(&group[0]) == key(&row) => group.push(row),
            _ => groups.push(vec![row]),
        }
    }
    groups
}

/// Full-corpus document count, needed before any idf can be computed.
pub fn count_documents(docs: &[InputDoc]) -> usize {
    docs.len()
}

/// Stage 1: tokenize `title + body` and emit one count-1 record per term
/// occurrence.
pub fn emit_term_occurrences(docs: &[InputDoc], tokenizer: &Tokenizer) -> Vec<TermDocCount> {
    let mut out = Vec::new();
    for doc in docs {
        let text = format!("{} {}", doc.body, doc.title);
        for term in tokenizer.tokenize(&text) {
            out.push(TermDocCount {
                term,
                doc_id: doc.doc_id,
                count: 1,
            });
        }
    }
    out
}

/// Stage 2: group by `(term, doc_id)` and sum occurrence counts into tf.
pub fn aggregate_term_frequencies(occurrences: Vec<TermDocCount>) -> Vec<TermDocTf> {
    group_by_key(occurrences, |r| (r.term.clone(), r.doc_id))
        .into_iter()
        .map(|group| {
            let tf = group.iter().map(|r| r.count).sum();
            let TermDocCount { term, doc_id, .. } = group.into_iter().next().expect("non-empty");
            TermDocTf { term, doc_id, tf }
        })
        .collect()
}

/// Stage 3: group by term; the group size is the term's document frequency.
/// `idf = log10(total_docs / doc_freq)`, `weight = tf * idf`.
pub fn compute_term_weights(tfs: Vec<TermDocTf>, total_docs: usize) -> Result<Vec<DocTermWeight>> {
    if total_docs == 0 {
        bail!("cannot weight terms against an empty corpus");
    }
    let mut out = Vec::new();
    for group in group_by_key(tfs, |r| r.term.clone()) {
        let doc_freq = group.len();
        let idf = (total_docs as f32 / doc_freq as f32).log10();
        for record in group {
            let weight = record.tf as f32 * idf;
            out.push(DocTermWeight {
                doc_id: record.doc_id,
                term: record.term,
                idf,
                tf: record.tf,
                weight,
            });
        }
    }
    Ok(out)
}

/// Stage 4: group by document; `norm = sum of weight^2` over the document's
/// terms, attached to every one of its postings.
pub fn accumulate_doc_norms(weights: Vec<DocTermWeight>) -> Vec<TermPosting> {
    let mut out = Vec::new();
    for group in group_by_key(weights, |r| r.doc_id) {
        let norm: f32 = group.iter().map(|r| r.weight * r.weight).sum();
        for record in group {
            out.push(TermPosting {
                term: record.term,
                idf: record.idf,
                doc_id: record.doc_id,
                weight: record.weight,
                norm,
            });
        }
    }
    out
}

/// Which partition a term's line lands in: `doc_id % 3` of its first posting.
pub fn partition_for(first_doc_id: DocId) -> usize {
    first_doc_id as usize % PARTITION_COUNT
}

/// Stage 5: group by term, lay each group out as one partition line
/// `term idf (doc_id weight norm)*`, and shard the lines across the three
/// partition files. A record that fails validation aborts the build; a corrupt
/// index must never be emitted.
pub fn write_partitions(postings: Vec<TermPosting>, out_dir: &Path) -> Result<()> {
    let mut writers = Vec::with_capacity(PARTITION_COUNT);
    for partition in 0..PARTITION_COUNT {
        let path = out_dir.join(partition_file_name(partition));
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        writers.push(BufWriter::new(file));
    }

    for mut group in group_by_key(postings, |r| r.term.clone()) {
        group.sort_by_key(|r| r.doc_id);
        let line = format_term_line(&group)?;
        let partition = partition_for(group[0].doc_id);
        writeln!(writers[partition], "{line}")
            .with_context(|| format!("writing partition {partition}"))?;
    }

    for (partition, writer) in writers.into_iter().enumerate() {
        writer
            .into_inner()
            .with_context(|| format!("flushing partition {partition}"))?
            .sync_all()
            .with_context(|| format!("syncing partition {partition}"))?;
    }
    Ok(())
}

fn format_term_line(group: &[TermPosting]) -> Result<String> {
    let first = &group[0];
    if first.term.is_empty() || first.term.contains(char::is_whitespace) {
        bail!("unwritable term {:?}", first.term);
    }
    if !first.idf.is_finite() {
        bail!("non-finite idf for term {:?}", first.term);
    }
    let mut line = format!("{} {}", first.term, first.idf);
    for posting in group {
        if !posting.weight.is_finite() || !posting.norm.is_finite() {
            bail!(
                "non-finite posting for term {:?}, doc {}",
                posting.term,
                posting.doc_id
            );
        }
        line.push_str(&format!(" {} {} {}", posting.doc_id, posting.weight, posting.norm));
    }
    Ok(line)
}

fn read_corpus(path: &Path) -> Result<Vec<InputDoc>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening corpus {}", path.display()))?;
    let mut docs = Vec::new();
    for row in reader.deserialize() {
        let doc: InputDoc =
            row.with_context(|| format!("reading corpus row from {}", path.display()))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn summarize(body: &str) -> String {
    body.chars().take(SUMMARY_CHARS).collect::<String>().trim().to_string()
}

/// Drive the whole pipeline: corpus CSV in, three partition files plus the
/// document metadata file out.
pub fn build_index(input: &Path, stopwords: &Path, output: &Path) -> Result<()> {
    fs::create_dir_all(output)
        .with_context(|| format!("creating index directory {}", output.display()))?;
    let tokenizer = Tokenizer::from_file(stopwords)?;
    let docs = read_corpus(input)?;

    let total_docs = count_documents(&docs);
    tracing::info!(total_docs, "counted corpus documents");

    let occurrences = emit_term_occurrences(&docs, &tokenizer);
    tracing::info!(records = occurrences.len(), "emitted term occurrences");

    let tfs = aggregate_term_frequencies(occurrences);
    tracing::info!(records = tfs.len(), "aggregated term frequencies");

    let weights = compute_term_weights(tfs, total_docs)?;
    let postings = accumulate_doc_norms(weights);
    tracing::info!(postings = postings.len(), "scored and normalized postings");

    write_partitions(postings, output)?;

    let metas: HashMap<DocId, DocMeta> = docs
        .iter()
        .map(|doc| {
            (
                doc.doc_id,
                DocMeta {
                    title: doc.title.clone(),
                    url: doc.url.clone(),
                    summary: summarize(&doc.body),
                },
            )
        })
        .collect();
    save_docs(output, &metas)?;

    tracing::info!(output = %output.display(), "index build complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(doc_id: DocId, title: &str, body: &str) -> InputDoc {
        InputDoc {
            doc_id,
            title: title.to_string(),
            url: None,
            body: body.to_string(),
        }
    }

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(["the", "and"].iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn occurrences_cover_title_and_body() {
        let docs = vec![doc(1, "Dune", "the spice must flow")];
        let occ = emit_term_occurrences(&docs, &tokenizer());
        let terms: Vec<&str> = occ.iter().map(|r| r.term.as_str()).collect();
        assert!(terms.contains(&"dune"));
        assert!(terms.contains(&"spice"));
        assert!(!terms.contains(&"the"));
        assert!(occ.iter().all(|r| r.count == 1 && r.doc_id == 1));
    }

    #[test]
    fn term_frequencies_sum_occurrences() {
        let docs = vec![doc(1, "", "spice spice spice sandworm")];
        let tfs = aggregate_term_frequencies(emit_term_occurrences(&docs, &tokenizer()));
        let spice = tfs.iter().find(|r| r.term == "spice").unwrap();
        assert_eq!(spice.tf, 3);
        let worm = tfs.iter().find(|r| r.term == "sandworm").unwrap();
        assert_eq!(worm.tf, 1);
    }

    #[test]
    fn idf_is_monotone_in_document_frequency() {
        // "dune" in 3 docs, "sandworm" in 1: the rarer term gets the larger idf
        let docs = vec![
            doc(1, "", "dune sandworm"),
            doc(2, "", "dune"),
            doc(3, "", "dune"),
        ];
        let tfs = aggregate_term_frequencies(emit_term_occurrences(&docs, &tokenizer()));
        let weights = compute_term_weights(tfs, 3).unwrap();
        let idf_of = |term: &str| {
            weights
                .iter()
                .find(|r| r.term == term)
                .map(|r| r.idf)
                .unwrap()
        };
        assert!(idf_of("sandworm") > idf_of("dune"));
        assert!((idf_of("dune") - 0.0).abs() < 1e-6);
    }

    #[test]
    fn single_document_corpus_weights_to_zero() {
        // one doc, one term: df = 1, idf = log10(1/1) = 0, weight and norm 0
        let docs = vec![doc(1, "", "spice")];
        let tfs = aggregate_term_frequencies(emit_term_occurrences(&docs, &tokenizer()));
        let weights = compute_term_weights(tfs, 1).unwrap();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].idf, 0.0);
        assert_eq!(weights[0].weight, 0.0);
        let postings = accumulate_doc_norms(weights);
        assert_eq!(postings[0].norm, 0.0);
    }

    #[test]
    fn norm_accumulates_squared_weights_per_document() {
        let weights = vec![
            DocTermWeight {
                doc_id: 1,
                term: "a".into(),
                idf: 1.0,
                tf: 1,
                weight: 3.0,
            },
            DocTermWeight {
                doc_id: 1,
                term: "b".into(),
                idf: 1.0,
                tf: 1,
                weight: 4.0,
            },
            DocTermWeight {
                doc_id: 2,
                term: "a".into(),
                idf: 1.0,
                tf: 1,
                weight: 2.0,
            },
        ];
        let postings = accumulate_doc_norms(weights);
        for p in &postings {
            match p.doc_id {
                1 => assert!((p.norm - 25.0).abs() < 1e-6),
                2 => assert!((p.norm - 4.0).abs() < 1e-6),
                other => panic!("unexpected doc {other}"),
            }
        }
    }

    #[test]
    fn lines_shard_by_first_posting_doc_id() {
        assert_eq!(partition_for(0), 0);
        assert_eq!(partition_for(7), 1);
        assert_eq!(partition_for(11), 2);
    }

    #[test]
    fn grouping_is_contiguous_per_key() {
        let rows = vec![("b", 1), ("a", 2), ("b", 3), ("a", 4)];
        let groups = group_by_key(rows, |r| r.0);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().any(|g| g.len() == 2 && g[0].0 == "a"));
        assert!(groups.iter().any(|g| g.len() == 2 && g[0].0 == "b"));
    }

    #[test]
    fn grouping_handles_owned_string_keys() {
        let rows: Vec<(String, u32)> = ["spice", "dune", "spice", "worm", "dune", "spice"]
            .iter()
            .enumerate()
            .map(|(i, term)| (term.to_string(), i as u32))
            .collect();
        let groups = group_by_key(rows, |r| r.0.clone());
        assert_eq!(groups.len(), 3);
        let spice = groups.iter().find(|g| g[0].0 == "spice").unwrap();
        assert_eq!(spice.len(), 3);
        for group in &groups {
            assert!(group.iter().all(|r| r.0 == group[0].0));
        }
    }

    #[test]
    fn non_finite_weight_aborts_the_write() {
        let group = vec![TermPosting {
            term: "dune".into(),
            idf: 0.3,
            doc_id: 1,
            weight: f32::NAN,
            norm: 0.0,
        }];
        assert!(format_term_line(&group).is_err());
    }
}
