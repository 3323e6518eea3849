pub mod cache;
pub mod docs;
pub mod engine;
pub mod index;
pub mod metrics;
pub mod tokenizer;

/// Document identifiers assigned by the crawler and carried through the
/// pipeline, the partition files, and the query results.
pub type DocId = u32;

pub use docs::DocMeta;
pub use engine::{EngineConfig, SearchEngine, SearchError};
pub use index::{Index, IndexEntry, IndexLoadError, Posting, TitleIndex};
