use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::instrument;

use crate::{
    catalog::CatalogStore,
    error::{AppError, AppResult},
    models::{Author, BookId, BookRecord, UserId},
};

/// Creates a PostgreSQL connection pool
///
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

const FAVORITES_QUERY: &str = r#"
    SELECT book_id::BIGINT AS book_id
    FROM library_favorite
    WHERE user_id = $1
    ORDER BY id
"#;

// Authors are aggregated in the same statement so the catalog is read in one
// round-trip regardless of its size.
const CATALOG_QUERY: &str = r#"
    SELECT
        b.id::BIGINT AS id,
        b.title,
        b.description,
        b.language,
        b.work_id,
        b.edition_information,
        b.publisher,
        b.num_pages::INT4 AS num_pages,
        b.series_id,
        b.series_name,
        b.series_position,
        COALESCE(
            array_agg(a.id::BIGINT ORDER BY ba.id) FILTER (WHERE a.id IS NOT NULL),
            ARRAY[]::BIGINT[]
        ) AS author_ids,
        COALESCE(
            array_agg(a.name::TEXT ORDER BY ba.id) FILTER (WHERE a.id IS NOT NULL),
            ARRAY[]::TEXT[]
        ) AS author_names
    FROM library_book b
    LEFT JOIN library_book_authors ba ON ba.book_id = b.id
    LEFT JOIN library_author a ON a.id = ba.author_id
    GROUP BY b.id
    ORDER BY b.title, b.id
"#;

#[derive(Debug, FromRow)]
struct FavoriteRow {
    book_id: i64,
}

#[derive(Debug, FromRow)]
struct CatalogRow {
    id: i64,
    title: String,
    description: Option<String>,
    language: Option<String>,
    work_id: Option<String>,
    edition_information: Option<String>,
    publisher: Option<String>,
    num_pages: Option<i32>,
    series_id: Option<String>,
    series_name: Option<String>,
    series_position: Option<String>,
    author_ids: Vec<i64>,
    author_names: Vec<String>,
}

impl From<CatalogRow> for BookRecord {
    fn from(row: CatalogRow) -> Self {
        let authors = row
            .author_ids
            .into_iter()
            .zip(row.author_names)
            .map(|(id, name)| Author { id, name })
            .collect();

        BookRecord {
            id: BookId(row.id),
            title: row.title,
            description: row.description,
            language: row.language,
            work_id: row.work_id,
            edition_information: row.edition_information,
            publisher: row.publisher,
            num_pages: row.num_pages,
            series_id: row.series_id,
            series_name: row.series_name,
            series_position: row.series_position,
            authors,
        }
    }
}

/// Catalog backed by the library database
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> AppError {
    tracing::error!(error = %e, "Catalog query failed");
    AppError::DataUnavailable(e.to_string())
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalog {
    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn list_favorite_book_ids(&self, user_id: UserId) -> AppResult<Vec<BookId>> {
        let rows: Vec<FavoriteRow> = sqlx::query_as(FAVORITES_QUERY)
            .bind(user_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(rows.into_iter().map(|row| BookId(row.book_id)).collect())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn fetch_all_books(&self) -> AppResult<Vec<BookRecord>> {
        let rows: Vec<CatalogRow> = sqlx::query_as(CATALOG_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        tracing::debug!(books = rows.len(), "Fetched catalog");

        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
