use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::{
    cache::{Cache, CacheKey},
    catalog::CatalogStore,
    error::AppResult,
    models::{BookId, BookRecord},
};

/// Position of a book in a snapshot
///
/// Every structure derived from a snapshot (term matrices, score columns)
/// is indexed by `RowId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub usize);

/// One catalog book plus the fields scoring reads on every comparison
#[derive(Debug, Clone)]
pub struct CorpusRow {
    pub book: BookRecord,
    pub author_names: BTreeSet<String>,
}

impl CorpusRow {
    fn new(book: BookRecord) -> Self {
        let author_names = book.authors.iter().map(|a| a.name.clone()).collect();
        Self { book, author_names }
    }

    /// Description with a missing value read as empty
    pub fn description_text(&self) -> &str {
        self.book.description.as_deref().unwrap_or("")
    }

    pub fn title_text(&self) -> &str {
        &self.book.title
    }
}

/// Raw catalog read, the form shared through Redis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDump {
    pub books: Vec<BookRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// In-memory table of the whole catalog, in catalog order
#[derive(Debug)]
pub struct CorpusSnapshot {
    rows: Vec<CorpusRow>,
    row_by_id: HashMap<BookId, RowId>,
    fingerprint: u64,
    fetched_at: DateTime<Utc>,
}

impl CorpusSnapshot {
    pub fn from_books(books: Vec<BookRecord>, fetched_at: DateTime<Utc>) -> Self {
        let mut hasher = DefaultHasher::new();
        books.hash(&mut hasher);
        let fingerprint = hasher.finish();

        let mut row_by_id = HashMap::with_capacity(books.len());
        for (i, book) in books.iter().enumerate() {
            match row_by_id.entry(book.id) {
                Entry::Vacant(slot) => {
                    slot.insert(RowId(i));
                }
                Entry::Occupied(_) => {
                    tracing::warn!(book_id = %book.id, "Duplicate book id in catalog, keeping first row");
                }
            }
        }

        Self {
            rows: books.into_iter().map(CorpusRow::new).collect(),
            row_by_id,
            fingerprint,
            fetched_at,
        }
    }

    pub fn from_dump(dump: CatalogDump) -> Self {
        Self::from_books(dump.books, dump.fetched_at)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[CorpusRow] {
        &self.rows
    }

    pub fn row(&self, row: RowId) -> &CorpusRow {
        &self.rows[row.0]
    }

    pub fn row_of(&self, book_id: BookId) -> Option<RowId> {
        self.row_by_id.get(&book_id).copied()
    }

    /// Stable hash of every row's content
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.rows.iter().map(CorpusRow::description_text).collect()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.rows.iter().map(CorpusRow::title_text).collect()
    }
}

/// Redis tier settings for the snapshot
#[derive(Clone)]
pub struct SharedSnapshotCache {
    pub cache: Cache,
    /// `None` keeps the entry until it is explicitly cleared
    pub ttl: Option<u64>,
}

/// Builds the corpus snapshot once and hands out the same copy afterwards
///
/// There is no invalidation policy: a snapshot lives until `clear` is called
/// or the process exits. Concurrent first calls may each read the catalog;
/// the first finished build is kept. A build that started before a `clear`
/// is returned to its caller but never memoized or written to Redis.
pub struct SnapshotStore {
    catalog: Arc<dyn CatalogStore>,
    shared: Option<SharedSnapshotCache>,
    memo: RwLock<Option<Arc<CorpusSnapshot>>>,
    /// Bumped by every `clear`
    generation: AtomicU64,
}

impl SnapshotStore {
    pub fn new(catalog: Arc<dyn CatalogStore>, shared: Option<SharedSnapshotCache>) -> Self {
        Self {
            catalog,
            shared,
            memo: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the memoized snapshot, building it on first use
    pub async fn get_or_build(&self) -> AppResult<Arc<CorpusSnapshot>> {
        if let Some(snapshot) = self.memo.read().await.as_ref() {
            return Ok(snapshot.clone());
        }

        let generation = self.generation.load(Ordering::Acquire);
        let (snapshot, write_back) = self.load().await?;
        let snapshot = Arc::new(snapshot);

        // Checked under the write lock so `clear` cannot interleave.
        let mut memo = self.memo.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!("Snapshot cache cleared during build, result not memoized");
            return Ok(snapshot);
        }

        if let (Some(shared), Some(dump)) = (&self.shared, write_back) {
            shared
                .cache
                .set_in_background(&CacheKey::CatalogSnapshot, &dump, shared.ttl);
        }

        Ok(memo.get_or_insert(snapshot).clone())
    }

    /// Reads the shared tier, then the catalog
    ///
    /// The dump comes back alongside the snapshot only when it was freshly
    /// fetched and a shared tier is configured.
    async fn load(&self) -> AppResult<(CorpusSnapshot, Option<CatalogDump>)> {
        if let Some(shared) = &self.shared {
            match shared
                .cache
                .get_from_cache::<CatalogDump>(&CacheKey::CatalogSnapshot)
                .await
            {
                Ok(Some(dump)) => {
                    tracing::info!(
                        books = dump.books.len(),
                        fetched_at = %dump.fetched_at,
                        "Loaded catalog snapshot from shared cache"
                    );
                    return Ok((CorpusSnapshot::from_dump(dump), None));
                }
                Ok(None) => tracing::debug!("Shared snapshot cache miss"),
                Err(e) => tracing::warn!(error = %e, "Shared snapshot cache unavailable"),
            }
        }

        let start = Instant::now();
        let books = self.catalog.fetch_all_books().await?;
        let dump = CatalogDump {
            books,
            fetched_at: Utc::now(),
        };

        let write_back = self.shared.as_ref().map(|_| dump.clone());
        let snapshot = CorpusSnapshot::from_dump(dump);
        tracing::info!(
            backend = self.catalog.name(),
            rows = snapshot.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built corpus snapshot"
        );

        Ok((snapshot, write_back))
    }

    /// Drops the memoized snapshot and the shared copy
    pub async fn clear(&self) -> AppResult<()> {
        {
            let mut memo = self.memo.write().await;
            self.generation.fetch_add(1, Ordering::AcqRel);
            memo.take();
        }
        if let Some(shared) = &self.shared {
            shared.cache.invalidate(&CacheKey::CatalogSnapshot).await?;
        }
        Ok(())
    }
}
