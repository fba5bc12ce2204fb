use std::collections::HashSet;

use super::index::RelevanceIndex;
use super::snapshot::{CorpusSnapshot, RowId};
use crate::error::{AppError, AppResult};
use crate::models::BookId;

/// Multipliers applied to each similarity signal
///
/// They do not sum to 1; a book matching every signal scores 1.2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityWeights {
    pub same_series: f64,
    pub shared_author: f64,
    pub same_publisher: f64,
    pub description_relevance: f64,
    pub title_relevance: f64,
}

impl SimilarityWeights {
    pub const DEFAULT: SimilarityWeights = SimilarityWeights {
        same_series: 0.5,
        shared_author: 0.3,
        same_publisher: 0.2,
        description_relevance: 0.1,
        title_relevance: 0.1,
    };
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Component signals between a candidate and one favorite
///
/// Metadata signals are 0.0 or 1.0; relevance signals are cosines in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signals {
    pub same_series: f64,
    pub shared_author: f64,
    pub same_publisher: f64,
    pub description_relevance: f64,
    pub title_relevance: f64,
}

impl Signals {
    pub fn weighted(&self, weights: &SimilarityWeights) -> f64 {
        weights.same_series * self.same_series
            + weights.shared_author * self.shared_author
            + weights.same_publisher * self.same_publisher
            + weights.description_relevance * self.description_relevance
            + weights.title_relevance * self.title_relevance
    }
}

/// Scores of every snapshot row against one favorite, indexed by `RowId`
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreColumn {
    pub favorite: BookId,
    pub scores: Vec<f64>,
}

/// Score columns in the order favorites were given
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreTable {
    columns: Vec<ScoreColumn>,
}

impl ScoreTable {
    pub fn from_columns(columns: Vec<ScoreColumn>) -> Self {
        Self { columns }
    }

    pub fn column(&self, favorite: BookId) -> Option<&ScoreColumn> {
        self.columns.iter().find(|c| c.favorite == favorite)
    }

    pub fn columns(&self) -> &[ScoreColumn] {
        &self.columns
    }

    /// Per-row sum across favorites, added in column order
    pub fn totals(&self, n_rows: usize) -> Vec<f64> {
        let mut totals = vec![0.0; n_rows];
        for column in &self.columns {
            for (total, score) in totals.iter_mut().zip(&column.scores) {
                *total += score;
            }
        }
        totals
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Computes score columns for one user's favorites
///
/// Holds only shared references, so one scorer can serve many threads at
/// once.
pub struct SimilarityScorer<'a> {
    snapshot: &'a CorpusSnapshot,
    index: &'a RelevanceIndex,
    weights: SimilarityWeights,
    favorite_ids: HashSet<BookId>,
}

impl<'a> SimilarityScorer<'a> {
    /// Fails if the index belongs to another snapshot or a favorite is not
    /// in the snapshot.
    pub fn new(
        snapshot: &'a CorpusSnapshot,
        index: &'a RelevanceIndex,
        favorites: &[BookId],
    ) -> AppResult<Self> {
        index.ensure_aligned(snapshot)?;

        if let Some(&missing) = favorites.iter().find(|&&id| snapshot.row_of(id).is_none()) {
            return Err(AppError::FavoriteNotInCorpus(missing));
        }

        Ok(Self {
            snapshot,
            index,
            weights: SimilarityWeights::DEFAULT,
            favorite_ids: favorites.iter().copied().collect(),
        })
    }

    pub fn with_weights(mut self, weights: SimilarityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// True for every row carrying a favorite's id, duplicates included
    pub fn is_favorite(&self, row: RowId) -> bool {
        self.favorite_ids.contains(&self.snapshot.row(row).book.id)
    }

    /// Signals between candidate row `b` and favorite row `f`
    pub fn signals(&self, b: RowId, f: RowId) -> Signals {
        let candidate = self.snapshot.row(b);
        let favorite = self.snapshot.row(f);

        let same_series = match non_blank(favorite.book.series_id.as_deref()) {
            Some(series) => candidate.book.series_id.as_deref() == Some(series),
            None => false,
        };
        let same_publisher = match non_blank(favorite.book.publisher.as_deref()) {
            Some(publisher) => candidate.book.publisher.as_deref() == Some(publisher),
            None => false,
        };
        let shared_author = !candidate.author_names.is_disjoint(&favorite.author_names);

        Signals {
            same_series: f64::from(u8::from(same_series)),
            shared_author: f64::from(u8::from(shared_author)),
            same_publisher: f64::from(u8::from(same_publisher)),
            description_relevance: self.index.description(b).cosine(self.index.description(f)),
            title_relevance: self.index.title(b).cosine(self.index.title(f)),
        }
    }

    /// Scores every snapshot row against one favorite
    ///
    /// Rows that are themselves favorites score 0.0.
    pub fn compute_column(&self, favorite: BookId) -> AppResult<ScoreColumn> {
        let f = self
            .snapshot
            .row_of(favorite)
            .ok_or(AppError::FavoriteNotInCorpus(favorite))?;

        let scores = (0..self.snapshot.len())
            .map(RowId)
            .map(|b| {
                if self.is_favorite(b) {
                    0.0
                } else {
                    self.signals(b, f).weighted(&self.weights)
                }
            })
            .collect();

        Ok(ScoreColumn { favorite, scores })
    }

    /// Computes every favorite's column on the calling thread
    pub fn score(&self, favorites: &[BookId]) -> AppResult<ScoreTable> {
        let columns = favorites
            .iter()
            .map(|&favorite| self.compute_column(favorite))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(ScoreTable::from_columns(columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, BookRecord};
    use chrono::Utc;

    const EPS: f64 = 1e-12;

    fn author(id: i64, name: &str) -> Author {
        Author { id, name: name.to_string() }
    }

    fn book(id: i64, title: &str) -> BookRecord {
        BookRecord::new(id, title)
    }

    fn build(books: Vec<BookRecord>) -> (CorpusSnapshot, RelevanceIndex) {
        let snapshot = CorpusSnapshot::from_books(books, Utc::now());
        let index = RelevanceIndex::build(&snapshot).unwrap();
        (snapshot, index)
    }

    #[test]
    fn test_series_beats_author() {
        let mut a = book(1, "Alpha");
        a.series_id = Some("S1".to_string());
        a.authors = vec![author(1, "X")];
        let mut b = book(2, "Bravo");
        b.series_id = Some("S1".to_string());
        b.authors = vec![author(2, "Y")];
        let mut c = book(3, "Charlie");
        c.authors = vec![author(1, "X")];

        let (snapshot, index) = build(vec![a, b, c]);
        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1)]).unwrap();
        let column = scorer.compute_column(BookId(1)).unwrap();

        assert_eq!(column.scores[0], 0.0);
        assert!((column.scores[1] - 0.5).abs() < EPS);
        assert!((column.scores[2] - 0.3).abs() < EPS);
    }

    #[test]
    fn test_publisher_match_adds_exactly_its_weight() {
        let mut favorite = book(1, "Alpha");
        favorite.series_id = Some("S".to_string());
        favorite.publisher = Some("Penguin".to_string());
        favorite.authors = vec![author(1, "X")];
        let mut same = favorite.clone();
        same.id = BookId(2);
        same.title = "Bravo".to_string();
        let mut other = same.clone();
        other.id = BookId(3);
        other.title = "Charlie".to_string();
        other.publisher = Some("Vintage".to_string());

        let (snapshot, index) = build(vec![favorite, same, other]);
        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1)]).unwrap();
        let column = scorer.compute_column(BookId(1)).unwrap();

        assert!((column.scores[1] - column.scores[2] - 0.2).abs() < EPS);
    }

    #[test]
    fn test_any_shared_author_earns_full_weight() {
        let mut favorite = book(1, "Alpha");
        favorite.authors = vec![author(1, "X"), author(2, "Y"), author(3, "Z")];
        let mut one = book(2, "Bravo");
        one.authors = vec![author(3, "Z"), author(4, "W")];
        let mut all = book(3, "Charlie");
        all.authors = favorite.authors.clone();

        let (snapshot, index) = build(vec![favorite, one, all]);
        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1)]).unwrap();

        let partial = scorer.signals(RowId(1), RowId(0));
        let full = scorer.signals(RowId(2), RowId(0));
        assert_eq!(partial.shared_author, 1.0);
        assert_eq!(full.shared_author, 1.0);
        // Overlap is symmetric.
        assert_eq!(scorer.signals(RowId(0), RowId(1)).shared_author, 1.0);
    }

    #[test]
    fn test_blank_metadata_never_matches() {
        let mut favorite = book(1, "Alpha");
        favorite.series_id = Some("  ".to_string());
        favorite.publisher = Some(String::new());
        let mut candidate = book(2, "Bravo");
        candidate.series_id = Some("  ".to_string());
        candidate.publisher = Some(String::new());

        let (snapshot, index) = build(vec![favorite, candidate]);
        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1)]).unwrap();
        let signals = scorer.signals(RowId(1), RowId(0));

        assert_eq!(signals, Signals::default());
    }

    #[test]
    fn test_all_signals_reach_one_point_two() {
        let mut favorite = book(1, "Dragon Saga");
        favorite.description = Some("dragons and knights".to_string());
        favorite.series_id = Some("S".to_string());
        favorite.publisher = Some("Tor".to_string());
        favorite.authors = vec![author(1, "X")];
        let mut twin = favorite.clone();
        twin.id = BookId(2);
        let (snapshot, index) = build(vec![favorite, twin, book(3, "Unrelated")]);

        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1)]).unwrap();
        let score = scorer.signals(RowId(1), RowId(0)).weighted(&SimilarityWeights::DEFAULT);
        assert!((score - 1.2).abs() < EPS);
    }

    #[test]
    fn test_favorites_are_zeroed_in_every_column() {
        let mut a = book(1, "Alpha");
        a.series_id = Some("S".to_string());
        let mut b = book(2, "Bravo");
        b.series_id = Some("S".to_string());
        let c = book(3, "Charlie");

        let (snapshot, index) = build(vec![a, b, c]);
        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1), BookId(2)]).unwrap();
        let table = scorer.score(&[BookId(1), BookId(2)]).unwrap();

        for column in table.columns() {
            assert_eq!(column.scores[0], 0.0);
            assert_eq!(column.scores[1], 0.0);
        }
    }

    #[test]
    fn test_unknown_favorite_fails() {
        let (snapshot, index) = build(vec![book(1, "Alpha")]);
        let result = SimilarityScorer::new(&snapshot, &index, &[BookId(42)]);
        assert!(matches!(result, Err(AppError::FavoriteNotInCorpus(BookId(42)))));
    }

    #[test]
    fn test_misaligned_index_fails() {
        let (_, index) = build(vec![book(1, "Alpha")]);
        let other = CorpusSnapshot::from_books(vec![book(1, "Alpha"), book(2, "Bravo")], Utc::now());
        let result = SimilarityScorer::new(&other, &index, &[BookId(1)]);
        assert!(matches!(result, Err(AppError::IndexMismatch(_))));
    }

    #[test]
    fn test_totals_sum_columns() {
        let table = ScoreTable::from_columns(vec![
            ScoreColumn { favorite: BookId(1), scores: vec![0.0, 0.5, 0.1] },
            ScoreColumn { favorite: BookId(2), scores: vec![0.3, 0.0, 0.2] },
        ]);
        let totals = table.totals(3);

        assert!((totals[0] - 0.3).abs() < EPS);
        assert!((totals[1] - 0.5).abs() < EPS);
        assert!((totals[2] - 0.3).abs() < EPS);
        assert_eq!(table.column(BookId(2)).unwrap().scores[2], 0.2);
        assert!(table.column(BookId(3)).is_none());
    }

    #[test]
    fn test_duplicate_rows_of_a_favorite_are_zeroed() {
        let mut first = book(1, "Alpha");
        first.series_id = Some("S".to_string());
        let mut dup = book(1, "Alpha (reissue)");
        dup.series_id = Some("S".to_string());
        let mut other = book(2, "Bravo");
        other.series_id = Some("S".to_string());

        let (snapshot, index) = build(vec![first, other, dup]);
        let scorer = SimilarityScorer::new(&snapshot, &index, &[BookId(1)]).unwrap();
        let column = scorer.compute_column(BookId(1)).unwrap();

        assert!(scorer.is_favorite(RowId(2)));
        assert_eq!(column.scores[2], 0.0);
        assert!(column.scores[1] >= 0.5);
    }
}
