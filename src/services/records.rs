use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use thiserror::Error;

use crate::services::ai::embedding::EmbeddingProvider;
use crate::services::ai::{LlmProvider, Message};
use crate::services::memory::{normalize_patient_key, ContextStore};
use crate::services::retrieval::{chunk_documents, VectorIndex};

const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 200;
const RETRIEVAL_K: usize = 4;

const DEFAULT_QUESTION: &str = "Provide a concise summary of this patient's medical history, \
                                key diagnoses, treatments, medications, and recent encounters.";

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("No documents configured for patient '{0}'. Add an entry to the patient manifest.")]
    PatientNotConfigured(String),
    #[error("Patient document not found: {0}")]
    DocumentMissing(PathBuf),
}

// EHR documents on disk: a directory of text reports plus a
// manifest.json mapping normalized patient names to their files.
pub struct PatientDocs {
    dir: PathBuf,
}

impl PatientDocs {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn load_manifest(&self) -> anyhow::Result<HashMap<String, Vec<String>>> {
        let path = self.dir.join("manifest.json");
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read patient manifest: {}", path.display()))
            }
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("patient manifest is not valid JSON: {}", path.display()))
    }

    // Unknown patients and manifest entries pointing at missing files
    // are hard errors.
    pub fn load_patient_documents(
        &self,
        patient_name: &str,
    ) -> anyhow::Result<Vec<(String, String)>> {
        let manifest = self.load_manifest()?;
        let key = normalize_patient_key(patient_name);
        let files = manifest
            .get(&key)
            .ok_or_else(|| RecordsError::PatientNotConfigured(patient_name.to_string()))?;

        let mut docs = Vec::new();
        for name in files {
            let path = self.dir.join(name);
            if !path.exists() {
                return Err(RecordsError::DocumentMissing(path).into());
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read patient document: {}", path.display()))?;
            docs.push((name.clone(), content));
        }
        Ok(docs)
    }
}

// Summarize a patient's history from their EHR documents, folding in
// stored summaries and manual notes, then persist the new summary back
// to memory under source "ehr_summary".
pub async fn summarize_patient_history(
    llm: &dyn LlmProvider,
    embeddings: &dyn EmbeddingProvider,
    docs: &PatientDocs,
    memory: &ContextStore,
    patient_name: &str,
    question: Option<&str>,
) -> anyhow::Result<String> {
    let loaded = docs.load_patient_documents(patient_name)?;
    let chunks = chunk_documents(&loaded, CHUNK_SIZE, CHUNK_OVERLAP);
    let index = VectorIndex::build(embeddings, chunks).await?;

    let question = question.unwrap_or(DEFAULT_QUESTION);
    let hits = index.search(embeddings, question, RETRIEVAL_K).await?;
    let ehr_context = hits
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let memory_context = memory.patient_context(patient_name)?;
    let notes_context = memory.patient_notes(patient_name)?;

    let mut full_context = format!("\n\n=== EHR DOCUMENTS ===\n\n{ehr_context}");
    if !memory_context.is_empty() {
        full_context.push_str("\n\n=== PREVIOUS SUMMARIES (MEMORY) ===\n\n");
        full_context.push_str(&memory_context);
    }
    if !notes_context.is_empty() {
        full_context.push_str("\n\n=== MANUAL NOTES ===\n\n");
        full_context.push_str(&notes_context);
    }

    let system = "You are a clinical assistant. \
                  You will receive EHR context, past summaries, manual notes and a question.";
    let request = format!(
        "CONTEXT:\n{full_context}\n\n\
         QUESTION:\n{question}\n\n\
         TASK:\n\
         1. Provide a clear, structured clinical summary.\n\
         2. Highlight diagnoses, medications, vitals, tests, and follow-up plans.\n\
         3. If there are conflicts, mention them explicitly.\n\
         4. Keep response under 250 words.\n\
         5. Write in simple, readable clinical language.\n\n\
         Answer:"
    );

    let result = llm.chat(system, &[Message::user(request)]).await?;

    memory.append_summary(patient_name, &result, "ehr_summary")?;
    Ok(result)
}
