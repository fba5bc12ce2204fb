use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{BookRecord, UserId};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub top_n: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    pub recommendations: Vec<BookRecord>,
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Top books for a user, best first
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let user_id = UserId(user_id);
    let top_n = resolve_top_n(query.top_n, state.default_top_n)?;

    let recommendations = state.engine.recommend(user_id, top_n).await?;

    Ok(Json(RecommendationResponse {
        user_id,
        recommendations,
    }))
}

/// Drops every memoized snapshot and index
pub async fn clear_cache(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.engine.clear_cache().await?;
    Ok(StatusCode::NO_CONTENT)
}

fn resolve_top_n(requested: Option<i64>, default: usize) -> AppResult<usize> {
    match requested {
        None => Ok(default),
        Some(n) if n > 0 => usize::try_from(n)
            .map_err(|_| AppError::InvalidInput(format!("top_n out of range: {}", n))),
        Some(n) => Err(AppError::InvalidInput(format!(
            "top_n must be a positive integer, got {}",
            n
        ))),
    }
}
