#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use shelf_recs::{
    catalog::CatalogStore,
    error::{AppError, AppResult},
    models::{Author, BookId, BookRecord, UserId},
    recommend::{RecommendationEngine, ScoringPool, ScoringStrategy},
};

/// Catalog held in memory, counting how often it is read
#[derive(Default)]
pub struct InMemoryCatalog {
    books: Mutex<Vec<BookRecord>>,
    favorites: HashMap<UserId, Vec<BookId>>,
    unavailable: bool,
    favorite_reads: AtomicUsize,
    catalog_reads: AtomicUsize,
    hold_next_fetch: AtomicBool,
    fetch_started: Notify,
    fetch_released: Notify,
}

impl InMemoryCatalog {
    pub fn new(books: Vec<BookRecord>) -> Self {
        Self {
            books: Mutex::new(books),
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn with_favorites(mut self, user: i64, books: &[i64]) -> Self {
        self.favorites
            .insert(UserId(user), books.iter().copied().map(BookId).collect());
        self
    }

    pub fn replace_books(&self, books: Vec<BookRecord>) {
        *self.books.lock().unwrap() = books;
    }

    /// Holds the next bulk read, after it has copied the books, until
    /// `release_fetch` is called
    pub fn hold_next_fetch(&self) {
        self.hold_next_fetch.store(true, Ordering::SeqCst);
    }

    pub async fn fetch_started(&self) {
        self.fetch_started.notified().await;
    }

    pub fn release_fetch(&self) {
        self.fetch_released.notify_one();
    }

    pub fn catalog_reads(&self) -> usize {
        self.catalog_reads.load(Ordering::SeqCst)
    }

    pub fn favorite_reads(&self) -> usize {
        self.favorite_reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_favorite_book_ids(&self, user_id: UserId) -> AppResult<Vec<BookId>> {
        self.favorite_reads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AppError::DataUnavailable("catalog offline".to_string()));
        }
        Ok(self.favorites.get(&user_id).cloned().unwrap_or_default())
    }

    async fn fetch_all_books(&self) -> AppResult<Vec<BookRecord>> {
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AppError::DataUnavailable("catalog offline".to_string()));
        }
        let books = self.books.lock().unwrap().clone();
        if self.hold_next_fetch.swap(false, Ordering::SeqCst) {
            self.fetch_started.notify_one();
            self.fetch_released.notified().await;
        }
        Ok(books)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct BookBuilder(BookRecord);

impl BookBuilder {
    pub fn new(id: i64, title: &str) -> Self {
        Self(BookRecord::new(id, title))
    }

    pub fn description(mut self, description: &str) -> Self {
        self.0.description = Some(description.to_string());
        self
    }

    pub fn series(mut self, series_id: &str) -> Self {
        self.0.series_id = Some(series_id.to_string());
        self
    }

    pub fn publisher(mut self, publisher: &str) -> Self {
        self.0.publisher = Some(publisher.to_string());
        self
    }

    pub fn author(mut self, id: i64, name: &str) -> Self {
        self.0.authors.push(Author {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn build(self) -> BookRecord {
        self.0
    }
}

/// A small catalog with overlapping authors, series and themes
pub fn library() -> Vec<BookRecord> {
    vec![
        BookBuilder::new(1, "The Fellowship of the Ring")
            .description("A hobbit leaves the Shire to destroy a dark ring of power")
            .series("middle-earth")
            .publisher("Allen & Unwin")
            .author(1, "J. R. R. Tolkien")
            .build(),
        BookBuilder::new(2, "The Two Towers")
            .description("The fellowship is broken and the ring bearer travels toward Mordor")
            .series("middle-earth")
            .publisher("Allen & Unwin")
            .author(1, "J. R. R. Tolkien")
            .build(),
        BookBuilder::new(3, "The Hobbit")
            .description("A hobbit joins dwarves on a quest to reclaim a mountain from a dragon")
            .publisher("Allen & Unwin")
            .author(1, "J. R. R. Tolkien")
            .build(),
        BookBuilder::new(4, "A Wizard of Earthsea")
            .description("A young wizard releases a shadow and must hunt it across the sea")
            .series("earthsea")
            .publisher("Parnassus")
            .author(2, "Ursula K. Le Guin")
            .build(),
        BookBuilder::new(5, "The Tombs of Atuan")
            .description("A priestess of dark powers meets a wizard in the labyrinth")
            .series("earthsea")
            .publisher("Atheneum")
            .author(2, "Ursula K. Le Guin")
            .build(),
        BookBuilder::new(6, "Pride and Prejudice")
            .description("Elizabeth Bennet spars with the proud Mr Darcy")
            .publisher("T. Egerton")
            .author(3, "Jane Austen")
            .build(),
        BookBuilder::new(7, "Emma")
            .description("A young woman meddles in the romances of her village")
            .publisher("John Murray")
            .author(3, "Jane Austen")
            .build(),
        BookBuilder::new(8, "Dune")
            .description("A desert planet, a noble family and the spice that rules the galaxy")
            .publisher("Chilton")
            .author(4, "Frank Herbert")
            .build(),
    ]
}

pub fn sequential_engine(catalog: Arc<InMemoryCatalog>) -> RecommendationEngine {
    RecommendationEngine::new(catalog, None, ScoringStrategy::Sequential)
}

pub fn parallel_engine(catalog: Arc<InMemoryCatalog>, workers: usize) -> RecommendationEngine {
    let pool = ScoringPool::new(Some(workers)).expect("scoring pool");
    RecommendationEngine::new(catalog, None, ScoringStrategy::Parallel(Arc::new(pool)))
}
