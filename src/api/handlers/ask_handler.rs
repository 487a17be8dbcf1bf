use axum::{Json, extract::State, response::IntoResponse};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::ask_dto::*},
    error::AppError,
    models::{ExtractedEntities, Intent, RetrievalMode},
};

pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question cannot be empty".to_string()));
    }

    let mode = match request.mode.as_deref() {
        Some(mode) => mode.parse::<RetrievalMode>()?,
        None => RetrievalMode::default(),
    };
    let model = request
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.default_model.clone());

    debug!("Ask ({}, {}): {}", mode, model, question);

    let trace = state.orchestrator.answer(question, mode, &model).await?;

    Ok(Json(AskResponse {
        answer: trace.answer.clone(),
        trace,
    }))
}

pub async fn route_question(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let intent: Intent = request.intent.parse()?;
    let entities = ExtractedEntities::from_raw(request.entities)?;
    let decision = state.orchestrator.router().route(intent, &entities);

    Ok(Json(RouteResponse {
        intent,
        entities,
        decision,
    }))
}

pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(ModelsResponse {
        models: state.orchestrator.models().available_models(),
        default_model: state.default_model.clone(),
    })
}
