use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use shelf_types::api::SummarizeRequest;
use shelf_types::models::Insight;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// POST /api/summarize
pub async fn summarize(
    State(state): State<AppState>,
    req: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<Json<Insight>> {
    let Json(req) = req?;
    let (title, author) = (req.title.trim(), req.author.trim());
    if title.is_empty() || author.is_empty() {
        return Err(ApiError::Validation("Title and author are required".into()));
    }

    let description = req.description.as_deref().unwrap_or_default();
    let insight = state.insights.generate(title, author, description).await?;
    Ok(Json(insight))
}
