use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ExecutionTrace;

// LLM-judge scores for one answer. Scores are null when the judge output
// could not be decoded; explanation then carries the raw text instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub correctness: Option<f64>,
    #[serde(default)]
    pub relevance: Option<f64>,
    #[serde(default)]
    pub explanation: String,
}

// One line of the append-only interaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_query: String,
    pub answer: String,
    pub trace: ExecutionTrace,
    #[serde(default)]
    pub evaluation: Option<Evaluation>,
}

impl InteractionRecord {
    pub fn new(
        user_query: String,
        answer: String,
        trace: ExecutionTrace,
        evaluation: Option<Evaluation>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            user_query,
            answer,
            trace,
            evaluation,
        }
    }
}
