use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::BookId;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Catalog unavailable: {0}")]
    DataUnavailable(String),

    #[error("Catalog is empty, nothing to recommend from")]
    EmptyCorpus,

    #[error("Favorite book {0} is not in the catalog")]
    FavoriteNotInCorpus(BookId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Relevance index does not match snapshot: {0}")]
    IndexMismatch(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::EmptyCorpus => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::FavoriteNotInCorpus(_)
            | AppError::IndexMismatch(_)
            | AppError::Cache(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
