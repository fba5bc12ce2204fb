use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::scorer::{ScoreColumn, ScoreTable, SimilarityScorer};
use crate::error::{AppError, AppResult};
use crate::models::BookId;

/// Fixed-size worker pool computing one favorite's column per task
///
/// Workers only read the snapshot and index through the scorer and return
/// their own column. Columns come back in favorite order, so the totals are
/// summed in the same order as the sequential path.
pub struct ScoringPool {
    pool: ThreadPool,
}

impl ScoringPool {
    /// Builds a pool of `workers` threads, or one per available core
    pub fn new(workers: Option<usize>) -> AppResult<Self> {
        let workers = match workers {
            Some(0) => {
                return Err(AppError::InvalidInput(
                    "Scoring worker count must be positive".to_string(),
                ))
            }
            Some(n) => n,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scoring-{}", i))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to start scoring pool: {}", e)))?;

        tracing::info!(workers, "Scoring pool started");

        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Computes every favorite's column on the pool and waits for all of them
    ///
    /// The first failing column fails the whole table.
    pub fn score(&self, scorer: &SimilarityScorer<'_>, favorites: &[BookId]) -> AppResult<ScoreTable> {
        let columns = self.pool.install(|| {
            favorites
                .par_iter()
                .with_max_len(1)
                .map(|&favorite| scorer.compute_column(favorite))
                .collect::<AppResult<Vec<ScoreColumn>>>()
        })?;

        Ok(ScoreTable::from_columns(columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, BookRecord};
    use crate::recommend::{CorpusSnapshot, RelevanceIndex};
    use chrono::Utc;

    fn corpus() -> Vec<BookRecord> {
        (1..=12)
            .map(|i| {
                let mut book = BookRecord::new(i, format!("Volume {} of the chronicle", i));
                book.description = Some(format!("A tale of kingdom {} and its river", i % 4));
                book.series_id = Some(format!("series-{}", i % 3));
                book.publisher = Some(format!("press-{}", i % 2));
                book.authors = vec![Author { id: i % 5, name: format!("author-{}", i % 5) }];
                book
            })
            .collect()
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(ScoringPool::new(Some(0)), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_pool_size_is_honored() {
        let pool = ScoringPool::new(Some(3)).unwrap();
        assert_eq!(pool.workers(), 3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let snapshot = CorpusSnapshot::from_books(corpus(), Utc::now());
        let index = RelevanceIndex::build(&snapshot).unwrap();
        let favorites = [BookId(2), BookId(7), BookId(11), BookId(4)];
        let scorer = SimilarityScorer::new(&snapshot, &index, &favorites).unwrap();

        let sequential = scorer.score(&favorites).unwrap();
        let parallel = ScoringPool::new(Some(4)).unwrap().score(&scorer, &favorites).unwrap();

        assert_eq!(sequential, parallel);
        let order: Vec<BookId> = parallel.columns().iter().map(|c| c.favorite).collect();
        assert_eq!(order, favorites.to_vec());
    }

    #[test]
    fn test_failing_column_fails_table() {
        let snapshot = CorpusSnapshot::from_books(corpus(), Utc::now());
        let index = RelevanceIndex::build(&snapshot).unwrap();
        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1)]).unwrap();

        let result = ScoringPool::new(Some(2))
            .unwrap()
            .score(&scorer, &[BookId(1), BookId(404)]);
        assert!(matches!(result, Err(AppError::FavoriteNotInCorpus(BookId(404)))));
    }
}
