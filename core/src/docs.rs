use crate::DocId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Display metadata stored next to the partition files. Used to build the
/// title index and to decorate ranked results; never consulted for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub title: String,
    pub url: Option<String>,
    pub summary: String,
}

pub const DOCS_FILE: &str = "docs.tsv";

/// Write document metadata as one tab-separated line per document:
/// `doc_id \t title \t url \t summary`. Tabs and newlines inside fields are
/// flattened to spaces so the format stays line-oriented.
pub fn save_docs(index_dir: &Path, docs: &HashMap<DocId, DocMeta>) -> Result<()> {
    let path = index_dir.join(DOCS_FILE);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let mut doc_ids: Vec<DocId> = docs.keys().copied().collect();
    doc_ids.sort_unstable();
    for doc_id in doc_ids {
        let meta = &docs[&doc_id];
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            doc_id,
            flatten(&meta.title),
            flatten(meta.url.as_deref().unwrap_or("")),
            flatten(&meta.summary),
        )
        .with_context(|| format!("writing {}", path.display()))?;
    }
    out.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

pub fn load_docs(index_dir: &Path) -> Result<HashMap<DocId, DocMeta>> {
    let path = index_dir.join(DOCS_FILE);
    let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut docs = HashMap::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(4, '\t');
        let doc_id: DocId = fields
            .next()
            .unwrap_or("")
            .parse()
            .with_context(|| format!("{}:{}: bad doc_id", path.display(), line_no + 1))?;
        let title = fields
            .next()
            .with_context(|| format!("{}:{}: missing title", path.display(), line_no + 1))?;
        let url = fields.next().unwrap_or("");
        let summary = fields.next().unwrap_or("");
        docs.insert(
            doc_id,
            DocMeta {
                title: title.to_string(),
                url: if url.is_empty() {
                    None
                } else {
                    Some(url.to_string())
                },
                summary: summary.to_string(),
            },
        );
    }
    Ok(docs)
}

fn flatten(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}
