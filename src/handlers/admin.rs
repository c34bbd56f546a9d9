use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{InteractionRecord, NoteEntry, SlotRow, SummaryEntry};
use crate::state::AppState;

// GET /api/slots
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub speciality: Option<String>,
    pub date: Option<String>,
}

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<SlotRow>>, AppError> {
    // blank filter params mean "no filter"
    let speciality = query.speciality.as_deref().filter(|s| !s.is_empty());
    let date = query.date.as_deref().filter(|s| !s.is_empty());
    let slots = state.slots.list_available(speciality, date)?;
    Ok(Json(slots))
}

// GET /api/patients/:name/memory
#[derive(Serialize)]
pub struct PatientMemoryResponse {
    pub summaries: Vec<SummaryEntry>,
    pub notes: Vec<NoteEntry>,
}

pub async fn get_patient_memory(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<PatientMemoryResponse>, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "patient name must not be empty".to_string(),
        ));
    }

    let summaries = state.memory.recent_summaries(&name, 5)?;
    let notes = state.memory.recent_notes(&name, 10)?;
    Ok(Json(PatientMemoryResponse { summaries, notes }))
}

// GET /api/logs
#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<InteractionRecord>>, AppError> {
    let limit = query.limit.unwrap_or(20);
    let records = state.log.recent(limit)?;
    Ok(Json(records))
}
