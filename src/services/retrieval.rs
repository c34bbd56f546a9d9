use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::services::ai::embedding::EmbeddingProvider;

#[derive(Debug, Clone)]
pub struct DocChunk {
    pub source: String,
    pub text: String,
}

// Chunks of at most chunk_size characters with overlap characters shared
// between neighbours, preferring paragraph, line, then sentence
// boundaries. Character counts, never byte offsets.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            if let Some(cut) = find_break(&chars[start..end]) {
                end = start + cut;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

// Best split point inside a window: after the last paragraph break, line
// break, or sentence end in its second half. None means hard-split.
fn find_break(window: &[char]) -> Option<usize> {
    let min = window.len() / 2;
    for pat in [&['\n', '\n'][..], &['\n'][..], &['.', ' '][..]] {
        if window.len() < pat.len() {
            continue;
        }
        let mut i = window.len() - pat.len();
        while i > min {
            if window[i..i + pat.len()] == *pat {
                return Some(i + pat.len());
            }
            i -= 1;
        }
    }
    None
}

// Every .txt/.md file in dir, sorted by name, as (file name, content)
// pairs. A missing directory is an empty corpus.
pub fn load_text_documents(dir: &Path) -> anyhow::Result<Vec<(String, String)>> {
    let mut docs = Vec::new();
    if !dir.exists() {
        return Ok(docs);
    }

    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to read document directory: {}", dir.display()))?
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
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read document: {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            docs.push((name, content));
        }
    }

    Ok(docs)
}

pub fn chunk_documents(
    docs: &[(String, String)],
    chunk_size: usize,
    overlap: usize,
) -> Vec<DocChunk> {
    let mut chunks = Vec::new();
    for (name, content) in docs {
        for text in split_text(content, chunk_size, overlap) {
            chunks.push(DocChunk {
                source: name.clone(),
                text,
            });
        }
    }
    chunks
}

// In-process nearest-neighbor index over embedded chunks. Build once,
// then rank by cosine similarity against an embedded query.
pub struct VectorIndex {
    chunks: Vec<DocChunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub async fn build(
        embeddings: &dyn EmbeddingProvider,
        chunks: Vec<DocChunk>,
    ) -> anyhow::Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embeddings.embed(&texts).await?;
        anyhow::ensure!(
            vectors.len() == chunks.len(),
            "embedding provider returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        );
        Ok(Self { chunks, vectors })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub async fn search(
        &self,
        embeddings: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> anyhow::Result<Vec<&DocChunk>> {
        let mut query_vectors = embeddings.embed(&[query.to_string()]).await?;
        let query_vector = query_vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned no vector for query"))?;

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (cosine_similarity(&query_vector, v), i))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, i)| &self.chunks[i])
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    // Deterministic embedder: one axis per keyword, counted per text.
    pub(crate) struct KeywordEmbedder(pub &'static [&'static str]);

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    self.0
                        .iter()
                        .map(|kw| lower.matches(kw).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split_text("just a short note", 100, 20);
        assert_eq!(chunks, vec!["just a short note".to_string()]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(split_text("", 100, 20).is_empty());
        assert!(split_text("   \n  ", 100, 20).is_empty());
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = "word ".repeat(500);
        for chunk in split_text(&text, 120, 30) {
            assert!(chunk.chars().count() <= 120);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let chunks = split_text(&text, 100, 10);
        // first chunk cut at the paragraph break, second carries the overlap
        assert_eq!(chunks[0], "a".repeat(80));
        assert!(chunks[1].starts_with('a'));
        assert!(chunks[1].ends_with(&"b".repeat(80)));
    }

    #[test]
    fn test_neighbouring_chunks_overlap() {
        let text = "x".repeat(250);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() >= 3);
        // 100 new chars minus 20 carried over per step
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let embedder = KeywordEmbedder(&["kidney", "heart", "lung"]);
        let chunks = vec![
            DocChunk {
                source: "cardio.md".to_string(),
                text: "heart heart heart failure".to_string(),
            },
            DocChunk {
                source: "renal.md".to_string(),
                text: "kidney function and kidney disease".to_string(),
            },
        ];
        let index = VectorIndex::build(&embedder, chunks).await.unwrap();
        let hits = index.search(&embedder, "chronic kidney disease", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "renal.md");
    }

    #[tokio::test]
    async fn test_search_returns_at_most_k() {
        let embedder = KeywordEmbedder(&["a"]);
        let chunks: Vec<DocChunk> = (0..5)
            .map(|i| DocChunk {
                source: format!("doc{i}"),
                text: "a".repeat(i + 1),
            })
            .collect();
        let index = VectorIndex::build(&embedder, chunks).await.unwrap();
        assert_eq!(index.len(), 5);
        let hits = index.search(&embedder, "a", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_cosine_similarity_identity_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
