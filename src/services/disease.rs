use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;

use crate::services::ai::embedding::EmbeddingProvider;
use crate::services::ai::{LlmProvider, Message};
use crate::services::retrieval::{chunk_documents, load_text_documents, VectorIndex};

const CHUNK_SIZE: usize = 1200;
const CHUNK_OVERLAP: usize = 200;
const RETRIEVAL_K: usize = 6;

type DocStamp = (PathBuf, Option<SystemTime>, u64);

struct CachedIndex {
    fingerprint: Vec<DocStamp>,
    index: Arc<VectorIndex>,
}

// Index over the disease reference corpus. Built lazily on first use,
// reused while the files are unchanged, rebuilt when their fingerprint
// moves or invalidate is called.
pub struct DiseaseIndex {
    dir: PathBuf,
    cached: tokio::sync::Mutex<Option<CachedIndex>>,
}

impl DiseaseIndex {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            cached: tokio::sync::Mutex::new(None),
        }
    }

    fn fingerprint(&self) -> anyhow::Result<Vec<DocStamp>> {
        let mut stamps = Vec::new();
        if !self.dir.exists() {
            return Ok(stamps);
        }
        let mut entries: Vec<_> = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read disease directory: {}", self.dir.display()))?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());
            if matches!(ext.as_deref(), Some("txt") | Some("md")) {
                let meta = entry.metadata().with_context(|| {
                    format!("failed to stat disease document: {}", path.display())
                })?;
                stamps.push((path, meta.modified().ok(), meta.len()));
            }
        }
        Ok(stamps)
    }

    // None means there are no reference documents at all.
    pub async fn get_or_build(
        &self,
        embeddings: &dyn EmbeddingProvider,
    ) -> anyhow::Result<Option<Arc<VectorIndex>>> {
        let mut cached = self.cached.lock().await;
        let fingerprint = self.fingerprint()?;

        if let Some(existing) = cached.as_ref() {
            if existing.fingerprint == fingerprint {
                return Ok(Some(Arc::clone(&existing.index)));
            }
        }
        *cached = None;

        let docs = load_text_documents(&self.dir)?;
        if docs.is_empty() {
            return Ok(None);
        }

        let chunks = chunk_documents(&docs, CHUNK_SIZE, CHUNK_OVERLAP);
        let index = Arc::new(VectorIndex::build(embeddings, chunks).await?);
        tracing::info!(documents = docs.len(), chunks = index.len(), "built disease knowledge index");
        *cached = Some(CachedIndex {
            fingerprint,
            index: Arc::clone(&index),
        });
        Ok(Some(index))
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

// Grounded in the local reference corpus when one exists, otherwise a
// plain model answer with the same safety guardrails.
pub async fn get_disease_information(
    llm: &dyn LlmProvider,
    embeddings: &dyn EmbeddingProvider,
    index: &DiseaseIndex,
    disease_query: &str,
) -> anyhow::Result<String> {
    let Some(vs) = index.get_or_build(embeddings).await? else {
        let system = "You are a cautious medical information assistant.";
        let request = format!(
            "User query: {disease_query}\n\n\
             TASK:\n\
             1. Explain the disease/condition in simple terms.\n\
             2. Summarize causes, symptoms, diagnosis, and standard treatments.\n\
             3. Mention red-flag symptoms for emergency care.\n\
             4. End with: \"This is not a medical diagnosis. Please consult a licensed doctor.\"\n\n\
             Keep the answer under 300 words and avoid giving exact drug doses."
        );
        return llm.chat(system, &[Message::user(request)]).await;
    };

    let hits = vs.search(embeddings, disease_query, RETRIEVAL_K).await?;
    let context = hits
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = "You are a medical information assistant using WHO/Medline style content.";
    let request = format!(
        "CONTEXT:\n{context}\n\n\
         USER QUESTION:\n{disease_query}\n\n\
         TASK:\n\
         1. Answer the question using the above context.\n\
         2. If the answer is not fully in the context, say what is missing.\n\
         3. Provide causes, symptoms, diagnosis, and standard treatments.\n\
         4. Mention red-flag symptoms for emergency care.\n\
         5. End with: \"This is not a medical diagnosis. Please consult a licensed doctor.\"\n\n\
         Keep answer under 350 words and avoid exact medication doses."
    );
    llm.chat(system, &[Message::user(request)]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.matches("fever").count() as f32])
                .collect())
        }
    }

    struct RecordingLlm {
        reply: &'static str,
        requests: Mutex<Vec<(String, String)>>,
    }

    impl RecordingLlm {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> (String, String) {
            self.requests.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn chat(&self, system: &str, messages: &[Message]) -> anyhow::Result<String> {
            let content = messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n");
            self.requests.lock().unwrap().push((system.to_string(), content));
            Ok(self.reply.to_string())
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_has_no_index() {
        let dir = tempdir().unwrap();
        let index = DiseaseIndex::new(dir.path().join("diseases"));
        let embedder = CountingEmbedder::new();
        assert!(index.get_or_build(&embedder).await.unwrap().is_none());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_index_builds_once_and_is_reused() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("dengue.md"), "Dengue causes fever.").unwrap();
        let index = DiseaseIndex::new(dir.path().to_path_buf());
        let embedder = CountingEmbedder::new();

        assert!(index.get_or_build(&embedder).await.unwrap().is_some());
        assert!(index.get_or_build(&embedder).await.unwrap().is_some());
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_new_document_triggers_rebuild() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("dengue.md"), "Dengue causes fever.").unwrap();
        let index = DiseaseIndex::new(dir.path().to_path_buf());
        let embedder = CountingEmbedder::new();

        let first = index.get_or_build(&embedder).await.unwrap().unwrap();
        fs::write(dir.path().join("malaria.md"), "Malaria also causes fever.").unwrap();
        let second = index.get_or_build(&embedder).await.unwrap().unwrap();

        assert_eq!(embedder.calls(), 2);
        assert!(second.len() > first.len());
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("dengue.md"), "Dengue causes fever.").unwrap();
        let index = DiseaseIndex::new(dir.path().to_path_buf());
        let embedder = CountingEmbedder::new();

        index.get_or_build(&embedder).await.unwrap();
        index.invalidate().await;
        index.get_or_build(&embedder).await.unwrap();
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_rag_answer_carries_corpus_context() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("dengue.md"),
            "Dengue fever is a mosquito-borne viral infection.",
        )
        .unwrap();
        let index = DiseaseIndex::new(dir.path().to_path_buf());
        let embedder = CountingEmbedder::new();
        let llm = RecordingLlm::new("Dengue information.");

        let answer = get_disease_information(&llm, &embedder, &index, "dengue fever")
            .await
            .unwrap();
        assert_eq!(answer, "Dengue information.");

        let (system, request) = llm.last();
        assert!(system.contains("WHO/Medline"));
        assert!(request.contains("mosquito-borne viral infection"));
        assert!(request.contains("USER QUESTION:\ndengue fever"));
        assert!(request.contains("This is not a medical diagnosis."));
    }

    #[tokio::test]
    async fn test_fallback_without_corpus_is_model_only() {
        let dir = tempdir().unwrap();
        let index = DiseaseIndex::new(dir.path().join("diseases"));
        let embedder = CountingEmbedder::new();
        let llm = RecordingLlm::new("General dengue advice.");

        let answer = get_disease_information(&llm, &embedder, &index, "dengue")
            .await
            .unwrap();
        assert_eq!(answer, "General dengue advice.");

        let (system, request) = llm.last();
        assert!(system.contains("cautious medical information assistant"));
        assert!(request.starts_with("User query: dengue"));
        assert!(!request.contains("CONTEXT:"));
    }
}
