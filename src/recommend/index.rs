use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::snapshot::{CorpusSnapshot, RowId};
use super::tfidf::{SparseVector, TermMatrix, TfidfVectorizer};
use crate::error::{AppError, AppResult};

/// Term-weight matrices for descriptions and titles
///
/// Row `i` of both matrices is `RowId(i)` of the snapshot identified by
/// `snapshot_fingerprint`. Use `ensure_aligned` before reading rows on
/// behalf of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceIndex {
    snapshot_fingerprint: u64,
    description: TermMatrix,
    title: TermMatrix,
}

impl RelevanceIndex {
    /// Vectorizes both text fields of every snapshot row
    pub fn build(snapshot: &CorpusSnapshot) -> AppResult<Self> {
        if snapshot.is_empty() {
            return Err(AppError::EmptyCorpus);
        }

        let vectorizer = TfidfVectorizer::english();
        Ok(Self {
            snapshot_fingerprint: snapshot.fingerprint(),
            description: vectorizer.fit_transform(&snapshot.descriptions()),
            title: vectorizer.fit_transform(&snapshot.titles()),
        })
    }

    pub fn snapshot_fingerprint(&self) -> u64 {
        self.snapshot_fingerprint
    }

    pub fn n_rows(&self) -> usize {
        self.description.n_rows()
    }

    pub fn description_matrix(&self) -> &TermMatrix {
        &self.description
    }

    pub fn title_matrix(&self) -> &TermMatrix {
        &self.title
    }

    pub fn is_aligned_with(&self, snapshot: &CorpusSnapshot) -> bool {
        self.snapshot_fingerprint == snapshot.fingerprint()
            && self.description.n_rows() == snapshot.len()
            && self.title.n_rows() == snapshot.len()
    }

    pub fn ensure_aligned(&self, snapshot: &CorpusSnapshot) -> AppResult<()> {
        if self.is_aligned_with(snapshot) {
            return Ok(());
        }
        Err(AppError::IndexMismatch(format!(
            "index built for snapshot {:x} with {} rows, scoring against {:x} with {} rows",
            self.snapshot_fingerprint,
            self.n_rows(),
            snapshot.fingerprint(),
            snapshot.len()
        )))
    }

    pub fn description(&self, row: RowId) -> &SparseVector {
        &self.description.rows()[row.0]
    }

    pub fn title(&self, row: RowId) -> &SparseVector {
        &self.title.rows()[row.0]
    }
}

/// Memo of the index for the current snapshot
///
/// A cached index is reused only while its fingerprint matches the snapshot
/// it is asked for; anything else triggers a rebuild that replaces it.
#[derive(Default)]
pub struct IndexCache {
    memo: RwLock<Option<Arc<RelevanceIndex>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build(&self, snapshot: &Arc<CorpusSnapshot>) -> AppResult<Arc<RelevanceIndex>> {
        if let Some(index) = self.memo.read().await.as_ref() {
            if index.is_aligned_with(snapshot) {
                return Ok(index.clone());
            }
        }

        let start = Instant::now();
        let source = snapshot.clone();
        let index = tokio::task::spawn_blocking(move || RelevanceIndex::build(&source))
            .await
            .map_err(|e| AppError::Internal(format!("Index build task failed: {}", e)))??;

        tracing::info!(
            rows = index.n_rows(),
            description_terms = index.description_matrix().vocabulary().len(),
            title_terms = index.title_matrix().vocabulary().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built relevance index"
        );

        let index = Arc::new(index);
        let mut memo = self.memo.write().await;
        match memo.as_ref() {
            Some(existing) if existing.is_aligned_with(snapshot) => Ok(existing.clone()),
            _ => {
                *memo = Some(index.clone());
                Ok(index)
            }
        }
    }

    pub async fn clear(&self) {
        self.memo.write().await.take();
    }
}
