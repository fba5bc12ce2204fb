//! Content-based book recommendations
//!
//! A request reads the user's favorites, scores every catalog book against
//! each favorite and returns the best totals. The catalog snapshot and its
//! relevance index are built once and memoized until `clear_cache`.

pub mod engine;
pub mod index;
pub mod parallel;
pub mod scorer;
pub mod snapshot;
pub mod stop_words;
pub mod tfidf;

pub use engine::{Recommendation, RecommendationEngine, ScoringStrategy};
pub use index::{IndexCache, RelevanceIndex};
pub use parallel::ScoringPool;
pub use scorer::{ScoreColumn, ScoreTable, Signals, SimilarityScorer, SimilarityWeights};
pub use snapshot::{CatalogDump, CorpusRow, CorpusSnapshot, RowId, SharedSnapshotCache, SnapshotStore};
pub use tfidf::{SparseVector, TermMatrix, TfidfVectorizer};
