use std::fs;
use std::path::Path;
use wikisearch_core::index::{partition_file_name, Index, IndexLoadError};

fn write_stopwords(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("stopwords.txt");
    fs::write(&path, "the\nand\nof\n").unwrap();
    path
}

fn write_partitions(dir: &Path, parts: [&str; 3]) {
    for (i, content) in parts.iter().enumerate() {
        fs::write(dir.join(partition_file_name(i)), content).unwrap();
    }
}

#[test]
fn loads_partitions_and_computes_magnitudes() {
    let dir = tempfile::tempdir().unwrap();
    let stopwords = write_stopwords(dir.path());
    write_partitions(
        dir.path(),
        [
            "dune 0.17609 1 0.17609 0.031 2 0.17609 0.031\n",
            "sandworm 0.47712 1 0.47712 0.2276\n",
            "spice 0.47712 2 0.47712 0.2276\n",
        ],
    );

    let index = Index::load(dir.path(), &stopwords).unwrap();
    assert_eq!(index.term_count(), 3);
    assert_eq!(index.doc_count(), 2);
    assert!(index.stopwords.contains("the"));

    // magnitude(d) == sqrt(sum of weight^2) recomputed from the postings
    let expected = (0.17609f32.powi(2) + 0.47712f32.powi(2)).sqrt();
    assert!((index.magnitude(1).unwrap() - expected).abs() < 1e-6);
    assert!((index.magnitude(2).unwrap() - expected).abs() < 1e-6);
}

#[test]
fn missing_partition_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let stopwords = write_stopwords(dir.path());
    // only two of the three partitions exist
    fs::write(dir.path().join(partition_file_name(0)), "dune 0.3 1 0.3 0.09\n").unwrap();
    fs::write(dir.path().join(partition_file_name(1)), "").unwrap();

    let err = Index::load(dir.path(), &stopwords).unwrap_err();
    assert!(matches!(err, IndexLoadError::MissingPartition { .. }));
    assert!(err.to_string().contains("part-00002"));
}

#[test]
fn missing_stopwords_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_partitions(dir.path(), ["", "", ""]);
    let err = Index::load(dir.path(), &dir.path().join("nope.txt")).unwrap_err();
    assert!(matches!(err, IndexLoadError::MissingStopwords { .. }));
}

#[test]
fn malformed_line_reports_file_and_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let stopwords = write_stopwords(dir.path());
    write_partitions(
        dir.path(),
        [
            "dune 0.3 1 0.3 0.09\n",
            "ok 0.1 4 0.1 0.01\nbroken 0.2 7 0.5\n",
            "",
        ],
    );

    let err = Index::load(dir.path(), &stopwords).unwrap_err();
    match err {
        IndexLoadError::MalformedLine { ref file, line, .. } => {
            assert!(file.ends_with(partition_file_name(1)));
            assert_eq!(line, 2);
        }
        other => panic!("expected MalformedLine, got {other:?}"),
    }
}

#[test]
fn non_numeric_idf_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let stopwords = write_stopwords(dir.path());
    write_partitions(dir.path(), ["dune nan-ish 1 0.3 0.09\n", "", ""]);
    let err = Index::load(dir.path(), &stopwords).unwrap_err();
    assert!(matches!(err, IndexLoadError::MalformedLine { .. }));
}
