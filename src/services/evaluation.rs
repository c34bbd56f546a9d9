use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;

use crate::models::{preview, Evaluation, InteractionRecord};
use crate::services::ai::{LlmProvider, Message};

// The model acts as judge: 1-5 for correctness and relevance plus a
// one-sentence explanation. An undecodable verdict degrades to null
// scores with the raw text as explanation.
pub async fn evaluate_answer(
    llm: &dyn LlmProvider,
    question: &str,
    answer: &str,
) -> anyhow::Result<Evaluation> {
    let system = "You are an evaluator. You will be given a question and an answer.";
    let request = format!(
        "Rate the answer on a scale of 1-5 for correctness and 1-5 for relevance.\n\
         Then provide a one-sentence explanation.\n\n\
         Return ONLY JSON with keys: correctness, relevance, explanation.\n\n\
         QUESTION: {question}\n\
         ANSWER: {answer}"
    );
    let raw = llm.chat(system, &[Message::user(request)]).await?;
    Ok(parse_evaluation(&raw))
}

fn parse_evaluation(raw: &str) -> Evaluation {
    if let (Some(first), Some(last)) = (raw.find('{'), raw.rfind('}')) {
        if first <= last {
            if let Ok(eval) = serde_json::from_str::<Evaluation>(&raw[first..=last]) {
                return eval;
            }
        }
    }
    Evaluation {
        correctness: None,
        relevance: None,
        explanation: preview(raw),
    }
}

// Append-only JSONL log of every handled request, one record per line.
pub struct InteractionLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl InteractionLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, record: &InteractionRecord) -> anyhow::Result<()> {
        let _guard = self.guard();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open interaction log: {}", self.path.display()))?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append interaction log: {}", self.path.display()))
    }

    // The limit most recent records, oldest first. Lines that fail to
    // decode (truncated writes, hand edits) are skipped.
    pub fn recent(&self, limit: usize) -> anyhow::Result<Vec<InteractionRecord>> {
        let _guard = self.guard();
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read interaction log: {}", self.path.display())
                })
            }
        };

        let records: Vec<InteractionRecord> = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable interaction log line");
                    None
                }
            })
            .collect();

        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionTrace, Plan};
    use tempfile::tempdir;

    fn sample_record(query: &str) -> InteractionRecord {
        let plan = Plan::DiseaseInfo {
            disease: Some(query.to_string()),
        };
        InteractionRecord::new(
            query.to_string(),
            "an answer".to_string(),
            ExecutionTrace {
                user_query: query.to_string(),
                plan,
                selected_tool: "get_disease_information".to_string(),
                tool_input: serde_json::Map::new(),
                tool_output_preview: "an answer".to_string(),
                patient_memory_used: String::new(),
            },
            None,
        )
    }

    #[test]
    fn test_parse_valid_judge_output() {
        let eval = parse_evaluation(r#"{"correctness": 4, "relevance": 5, "explanation": "Good."}"#);
        assert_eq!(eval.correctness, Some(4.0));
        assert_eq!(eval.relevance, Some(5.0));
        assert_eq!(eval.explanation, "Good.");
    }

    #[test]
    fn test_parse_judge_output_wrapped_in_prose() {
        let eval = parse_evaluation(
            "Here is my verdict: {\"correctness\": 3, \"relevance\": 2, \"explanation\": \"Off-topic.\"} Hope that helps.",
        );
        assert_eq!(eval.correctness, Some(3.0));
        assert_eq!(eval.explanation, "Off-topic.");
    }

    #[test]
    fn test_parse_garbage_degrades_to_null_scores() {
        let raw = "I cannot rate this.".repeat(40);
        let eval = parse_evaluation(&raw);
        assert_eq!(eval.correctness, None);
        assert_eq!(eval.relevance, None);
        assert_eq!(eval.explanation.chars().count(), 400);
    }

    #[test]
    fn test_parse_partial_keys_default() {
        let eval = parse_evaluation(r#"{"correctness": 5}"#);
        assert_eq!(eval.correctness, Some(5.0));
        assert_eq!(eval.relevance, None);
        assert_eq!(eval.explanation, "");
    }

    #[test]
    fn test_log_round_trip_and_limit() {
        let dir = tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("agent_log.jsonl"));

        for i in 0..4 {
            log.append(&sample_record(&format!("query {i}"))).unwrap();
        }

        let recent = log.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_query, "query 2");
        assert_eq!(recent[1].user_query, "query 3");
    }

    #[test]
    fn test_log_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("agent_log.jsonl"));
        assert!(log.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_log_skips_undecodable_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent_log.jsonl");
        let log = InteractionLog::new(path.clone());

        log.append(&sample_record("good one")).unwrap();
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{half a record").unwrap();
        log.append(&sample_record("another good one")).unwrap();

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].user_query, "another good one");
    }
}
