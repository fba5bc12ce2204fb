use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use super::index::{IndexCache, RelevanceIndex};
use super::parallel::ScoringPool;
use super::scorer::{ScoreTable, SimilarityScorer};
use super::snapshot::{CorpusSnapshot, RowId, SharedSnapshotCache, SnapshotStore};
use crate::{
    catalog::CatalogStore,
    error::{AppError, AppResult},
    models::{BookId, BookRecord, UserId, MAX_FAVORITES},
};

/// How score columns are computed for a request
#[derive(Clone)]
pub enum ScoringStrategy {
    /// On the request task, one favorite after another
    Sequential,
    /// One favorite per pool worker, joined before aggregation
    Parallel(Arc<ScoringPool>),
}

/// A recommended book with its summed score across favorites
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub book: BookRecord,
    pub score: f64,
}

/// Entry point of the recommendation core
///
/// Owns the process-wide snapshot and index memos. Both live until
/// `clear_cache` is called; catalog edits are not seen before that.
pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogStore>,
    snapshots: SnapshotStore,
    indexes: IndexCache,
    strategy: ScoringStrategy,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        shared_cache: Option<SharedSnapshotCache>,
        strategy: ScoringStrategy,
    ) -> Self {
        Self {
            snapshots: SnapshotStore::new(catalog.clone(), shared_cache),
            catalog,
            indexes: IndexCache::new(),
            strategy,
        }
    }

    /// Top `top_n` books for the user, best first
    pub async fn recommend(&self, user_id: UserId, top_n: usize) -> AppResult<Vec<BookRecord>> {
        let ranked = self.recommend_scored(user_id, top_n).await?;
        Ok(ranked.into_iter().map(|r| r.book).collect())
    }

    /// Same as `recommend`, keeping each book's aggregate score
    pub async fn recommend_scored(
        &self,
        user_id: UserId,
        top_n: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if top_n == 0 {
            return Err(AppError::InvalidInput(
                "top_n must be a positive integer".to_string(),
            ));
        }

        let favorites = dedup_favorites(self.catalog.list_favorite_book_ids(user_id).await?);
        if favorites.is_empty() {
            tracing::debug!(user_id = %user_id, "No favorites, skipping recommendation");
            return Ok(Vec::new());
        }
        if favorites.len() > MAX_FAVORITES {
            tracing::warn!(
                user_id = %user_id,
                favorites = favorites.len(),
                limit = MAX_FAVORITES,
                "User has more favorites than the catalog allows"
            );
        }

        let start = Instant::now();
        let snapshot = self.snapshots.get_or_build().await?;
        let index = self.indexes.get_or_build(&snapshot).await?;

        let table = self.score(&snapshot, &index, &favorites).await?;
        let ranked = rank(&snapshot, &table, &favorites, top_n);

        if let Some(top) = ranked.first() {
            tracing::debug!(
                user_id = %user_id,
                book_id = %top.book.id,
                title = %top.book.title,
                author = top.book.primary_author().map(|a| a.name.as_str()),
                score = top.score,
                "Top recommendation"
            );
        }

        tracing::info!(
            user_id = %user_id,
            favorites = favorites.len(),
            corpus = snapshot.len(),
            returned = ranked.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendations computed"
        );

        Ok(ranked)
    }

    async fn score(
        &self,
        snapshot: &Arc<CorpusSnapshot>,
        index: &Arc<RelevanceIndex>,
        favorites: &[BookId],
    ) -> AppResult<ScoreTable> {
        match &self.strategy {
            ScoringStrategy::Sequential => {
                SimilarityScorer::new(snapshot, index, favorites)?.score(favorites)
            }
            ScoringStrategy::Parallel(pool) => {
                let pool = pool.clone();
                let snapshot = snapshot.clone();
                let index = index.clone();
                let favorites = favorites.to_vec();

                tokio::task::spawn_blocking(move || {
                    let scorer = SimilarityScorer::new(&snapshot, &index, &favorites)?;
                    pool.score(&scorer, &favorites)
                })
                .await
                .map_err(|e| AppError::Internal(format!("Scoring worker failed: {}", e)))?
            }
        }
    }

    /// Drops the memoized snapshot and index, including the shared copy
    ///
    /// Call after any change to books or authors in the catalog.
    pub async fn clear_cache(&self) -> AppResult<()> {
        self.indexes.clear().await;
        self.snapshots.clear().await?;
        tracing::info!("Recommendation caches cleared");
        Ok(())
    }
}

fn dedup_favorites(favorites: Vec<BookId>) -> Vec<BookId> {
    let mut seen = HashSet::with_capacity(favorites.len());
    favorites.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Orders non-favorite rows by total score, ties kept in snapshot order
///
/// A row is a favorite when its book id is, so repeated catalog rows of a
/// favorite are excluded too.
fn rank(
    snapshot: &CorpusSnapshot,
    table: &ScoreTable,
    favorites: &[BookId],
    top_n: usize,
) -> Vec<Recommendation> {
    let favorite_ids: HashSet<BookId> = favorites.iter().copied().collect();

    let mut candidates: Vec<(RowId, f64)> = table
        .totals(snapshot.len())
        .into_iter()
        .enumerate()
        .map(|(i, score)| (RowId(i), score))
        .filter(|(row, _)| !favorite_ids.contains(&snapshot.row(*row).book.id))
        .collect();

    // Stable sort keeps snapshot order among equal scores.
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    candidates
        .into_iter()
        .take(top_n)
        .map(|(row, score)| Recommendation {
            book: snapshot.row(row).book.clone(),
            score,
        })
        .collect()
}
