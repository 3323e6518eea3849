use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-zA-Z0-9 ]+").expect("valid regex");
}

/// Normalize raw text into candidate terms: strip every character that is not
/// an ASCII letter, digit, or space, casefold, then split on whitespace.
/// Stopword filtering happens in [`Tokenizer::tokenize`].
pub fn normalize(text: &str) -> Vec<String> {
    NON_ALNUM
        .replace_all(text, "")
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Shared normalizer for the indexing pipeline and the query engine. Retrieval
/// only works if both sides produce byte-identical terms, so everything funnels
/// through this one type.
pub struct Tokenizer {
    stopwords: HashSet<String>,
}

impl Tokenizer {
    pub fn new(stopwords: HashSet<String>) -> Self {
        Self { stopwords }
    }

    /// Load a stopword file: one term per line, UTF-8.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening stopwords file {}", path.display()))?;
        let mut stopwords = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            let word = line.trim();
            if !word.is_empty() {
                stopwords.insert(word.to_string());
            }
        }
        Ok(Self::new(stopwords))
    }

    /// Normalize `text` and drop stopwords.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        normalize(text)
            .into_iter()
            .filter(|term| !self.stopwords.contains(term))
            .collect()
    }

    pub fn stopwords(&self) -> &HashSet<String> {
        &self.stopwords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        let stops = ["the", "and", "of"].iter().map(|s| s.to_string()).collect();
        Tokenizer::new(stops)
    }

    #[test]
    fn strips_punctuation_and_casefolds() {
        let toks = tokenizer().tokenize("Hello, World! (42)");
        assert_eq!(toks, vec!["hello", "world", "42"]);
    }

    #[test]
    fn drops_stopwords() {
        let toks = tokenizer().tokenize("The Lord of the Rings");
        assert_eq!(toks, vec!["lord", "rings"]);
    }

    #[test]
    fn non_ascii_is_stripped_not_transliterated() {
        // matches the pipeline's behavior: "café" indexes as "caf"
        let toks = tokenizer().tokenize("café");
        assert_eq!(toks, vec!["caf"]);
    }

    #[test]
    fn stable_under_renormalization() {
        let t = tokenizer();
        let once = t.tokenize("Isaac Asimov's \"Foundation\" (1951)");
        let again = t.tokenize(&once.join(" "));
        assert_eq!(once, again);
    }
}
