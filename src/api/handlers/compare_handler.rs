use axum::{Json, extract::State, response::IntoResponse};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::compare_dto::*},
    error::AppError,
};

/// 用原始问题在每个对比语料上各取最相近的一条片段
pub async fn compare(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question cannot be empty".to_string()));
    }

    debug!(
        "Comparing {} corpora for: {}",
        state.comparison.len(),
        question
    );
    let entries = state.comparison.compare(question).await?;

    Ok(Json(CompareResponse {
        question: question.to_string(),
        entries,
    }))
}
