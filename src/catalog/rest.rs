//! Catalog REST API backend
//!
//! Reads the catalog through the library service's HTTP API:
//! 1. Full catalog: `GET {base}/books` → books with nested authors
//! 2. Favorites: `GET {base}/users/{id}/favorites` → `[{ "book": id }]`

use reqwest::{Client as HttpClient, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::instrument;

use crate::{
    catalog::CatalogStore,
    error::{AppError, AppResult},
    models::{Author, BookId, BookRecord, UserId},
};

/// Book as serialized by the catalog API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiBook {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub work_id: Option<String>,
    #[serde(default)]
    pub edition_information: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub num_pages: Option<i32>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub series_position: Option<String>,
    #[serde(default)]
    pub authors: Vec<ApiAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiAuthor {
    pub id: i64,
    pub name: String,
}

/// Favorite entry as serialized by the catalog API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiFavorite {
    pub book: i64,
}

impl From<ApiBook> for BookRecord {
    fn from(book: ApiBook) -> Self {
        BookRecord {
            id: BookId(book.id),
            title: book.title,
            description: book.description,
            language: book.language,
            work_id: book.work_id,
            edition_information: book.edition_information,
            publisher: book.publisher,
            num_pages: book.num_pages,
            series_id: book.series_id,
            series_name: book.series_name,
            series_position: book.series_position,
            authors: book
                .authors
                .into_iter()
                .map(|a| Author { id: a.id, name: a.name })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct RestCatalog {
    http_client: HttpClient,
    api_url: String,
    api_token: Option<String>,
}

impl RestCatalog {
    pub fn new(api_url: String, api_token: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.http_client.get(format!("{}{}", self.api_url, path));
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a GET and decodes the JSON body, reporting any failure as unavailable
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.get(path).send().await.map_err(|e| {
            tracing::error!(error = %e, path = %path, "Catalog API request failed");
            AppError::DataUnavailable(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                path = %path,
                status = %status,
                body = %body,
                "Catalog API returned an error"
            );
            return Err(AppError::DataUnavailable(format!(
                "Catalog API returned status {}: {}",
                status, body
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::DataUnavailable(format!("Failed to parse catalog response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl CatalogStore for RestCatalog {
    #[instrument(skip(self), fields(backend = "rest"))]
    async fn list_favorite_book_ids(&self, user_id: UserId) -> AppResult<Vec<BookId>> {
        let favorites: Vec<ApiFavorite> = self
            .get_json(&format!("/users/{}/favorites", user_id))
            .await?;

        Ok(favorites.into_iter().map(|f| BookId(f.book)).collect())
    }

    #[instrument(skip(self), fields(backend = "rest"))]
    async fn fetch_all_books(&self) -> AppResult<Vec<BookRecord>> {
        let books: Vec<ApiBook> = self.get_json("/books").await?;

        tracing::debug!(books = books.len(), "Fetched catalog");

        Ok(books.into_iter().map(BookRecord::from).collect())
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
