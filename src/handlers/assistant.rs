use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Evaluation, ExecutionTrace, InteractionRecord};
use crate::services::agent::run_agent;
use crate::services::evaluation::evaluate_answer;
use crate::state::AppState;

// POST /api/assistant
#[derive(Deserialize)]
pub struct AssistantRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct AssistantResponse {
    pub answer: String,
    pub trace: ExecutionTrace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

pub async fn run_assistant(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AssistantRequest>,
) -> Result<Json<AssistantResponse>, AppError> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(AppError::InvalidRequest(
            "query must not be empty".to_string(),
        ));
    }

    tracing::info!(query_chars = query.chars().count(), "assistant request");
    let outcome = run_agent(&state, query).await?;

    // Judge and log are best-effort: neither may sink a served answer.
    let evaluation = if state.config.eval_enabled {
        match evaluate_answer(state.llm.as_ref(), query, &outcome.answer).await {
            Ok(eval) => Some(eval),
            Err(e) => {
                tracing::error!(error = %e, "answer evaluation failed");
                None
            }
        }
    } else {
        None
    };

    let record = InteractionRecord::new(
        query.to_string(),
        outcome.answer.clone(),
        outcome.trace.clone(),
        evaluation.clone(),
    );
    if let Err(e) = state.log.append(&record) {
        tracing::error!(error = %e, "failed to append interaction log");
    }

    Ok(Json(AssistantResponse {
        answer: outcome.answer,
        trace: outcome.trace,
        evaluation,
    }))
}
