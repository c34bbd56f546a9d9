use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{NoteEntry, SummaryEntry};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// Append-only patient memory persisted as two JSON files: one of
// generated summaries, one of manually recorded notes. Entries are keyed
// by normalized patient name and never rewritten, only appended.
pub struct ContextStore {
    summaries_path: PathBuf,
    notes_path: PathBuf,
    lock: Mutex<()>,
}

// Names differing only in case or surrounding whitespace share one key.
pub fn normalize_patient_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn now_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

impl ContextStore {
    pub fn new(summaries_path: PathBuf, notes_path: PathBuf) -> Self {
        Self {
            summaries_path,
            notes_path,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load<T: DeserializeOwned>(&self, path: &PathBuf) -> anyhow::Result<BTreeMap<String, Vec<T>>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read memory file: {}", path.display()))
            }
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "memory file is not valid JSON, starting empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn save<T: Serialize>(&self, path: &PathBuf, map: &BTreeMap<String, Vec<T>>) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data directory: {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(map)?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write memory file: {}", path.display()))
    }

    pub fn append_summary(
        &self,
        patient_name: &str,
        summary: &str,
        source: &str,
    ) -> anyhow::Result<()> {
        let _guard = self.guard();
        let mut map: BTreeMap<String, Vec<SummaryEntry>> = self.load(&self.summaries_path)?;
        map.entry(normalize_patient_key(patient_name))
            .or_default()
            .push(SummaryEntry {
                timestamp: now_stamp(),
                source: source.to_string(),
                summary: summary.to_string(),
            });
        self.save(&self.summaries_path, &map)
    }

    pub fn append_note(
        &self,
        patient_name: &str,
        note: &str,
        conditions: &str,
        medications: &str,
    ) -> anyhow::Result<()> {
        let _guard = self.guard();
        let mut map: BTreeMap<String, Vec<NoteEntry>> = self.load(&self.notes_path)?;
        map.entry(normalize_patient_key(patient_name))
            .or_default()
            .push(NoteEntry {
                timestamp: now_stamp(),
                note: note.to_string(),
                conditions: conditions.to_string(),
                medications: medications.to_string(),
            });
        self.save(&self.notes_path, &map)
    }

    // The limit most recent summaries for a patient, oldest first.
    pub fn recent_summaries(
        &self,
        patient_name: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<SummaryEntry>> {
        let _guard = self.guard();
        let map: BTreeMap<String, Vec<SummaryEntry>> = self.load(&self.summaries_path)?;
        Ok(tail(map.get(&normalize_patient_key(patient_name)), limit))
    }

    pub fn recent_notes(
        &self,
        patient_name: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<NoteEntry>> {
        let _guard = self.guard();
        let map: BTreeMap<String, Vec<NoteEntry>> = self.load(&self.notes_path)?;
        Ok(tail(map.get(&normalize_patient_key(patient_name)), limit))
    }

    // Recent summaries rendered as prompt context; empty string when the
    // patient has none.
    pub fn patient_context(&self, patient_name: &str) -> anyhow::Result<String> {
        let entries = self.recent_summaries(patient_name, 5)?;
        Ok(entries
            .iter()
            .map(|e| format!("[{} from {}]\n{}", e.timestamp, e.source, e.summary))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    pub fn patient_notes(&self, patient_name: &str) -> anyhow::Result<String> {
        let entries = self.recent_notes(patient_name, 10)?;
        Ok(entries
            .iter()
            .map(|e| {
                format!(
                    "[{}] Conditions: {} | Medications: {}\nNote: {}",
                    e.timestamp, e.conditions, e.medications, e.note
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn tail<T: Clone>(entries: Option<&Vec<T>>, limit: usize) -> Vec<T> {
    match entries {
        Some(list) => {
            let skip = list.len().saturating_sub(limit);
            list[skip..].to_vec()
        }
        None => Vec::new(),
    }
}
