//! Retrieval over the service corpus.
//!
//! Each CSV row becomes one document rendered as `column: value` lines. The
//! embedded documents are kept in a brute-force cosine index that is saved to
//! disk together with a blake3 fingerprint of the corpus, so a changed corpus
//! is detected and re-embedded at startup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cleanerio_core::config::KnowledgeConfig;
use cleanerio_core::DispatchError;

use crate::llm::{EmbeddingProvider, OracleError};

const REQUIRED_COLUMNS: [&str; 2] = ["service", "price"];

/// Snippets returned for one query, best match first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    pub snippets: Vec<String>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Prompt rendering; empty when nothing was retrieved.
    pub fn joined(&self) -> String {
        self.snippets.join("\n\n")
    }
}

#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<RetrievedContext, DispatchError>;
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not read corpus `{path}`: {source}")]
    Corpus {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("corpus `{path}` must have `service` and `price` columns")]
    MissingColumns { path: PathBuf },
    #[error("corpus `{path}` has no rows")]
    EmptyCorpus { path: PathBuf },
    #[error("could not access `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode index `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode index: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("embedding failed: {0}")]
    Embedding(#[from] OracleError),
    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, actual: usize },
}

/// Documents parsed from the corpus file plus the fingerprint of its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Corpus {
    pub documents: Vec<String>,
    pub fingerprint: String,
}

impl Corpus {
    pub async fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| KnowledgeError::Io { path: path.to_path_buf(), source })?;
        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, raw: &[u8]) -> Result<Self, KnowledgeError> {
        let corpus_error =
            |source: csv::Error| KnowledgeError::Corpus { path: path.to_path_buf(), source };

        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(raw);
        let headers = reader.headers().map_err(corpus_error)?.clone();
        let has_required =
            REQUIRED_COLUMNS.iter().all(|column| headers.iter().any(|header| header == *column));
        if !has_required {
            return Err(KnowledgeError::MissingColumns { path: path.to_path_buf() });
        }

        let mut documents = Vec::new();
        for record in reader.records() {
            let record = record.map_err(corpus_error)?;
            let document = headers
                .iter()
                .zip(record.iter())
                .map(|(column, value)| format!("{column}: {value}"))
                .collect::<Vec<_>>()
                .join("\n");
            documents.push(document);
        }

        if documents.is_empty() {
            return Err(KnowledgeError::EmptyCorpus { path: path.to_path_buf() });
        }

        Ok(Self { documents, fingerprint: blake3::hash(raw).to_hex().to_string() })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct IndexedSnippet {
    content: String,
    embedding: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredSnippet {
    pub content: String,
    pub score: f64,
}

/// Embedded corpus, searchable by cosine similarity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeIndex {
    pub embedding_model: String,
    pub corpus_fingerprint: String,
    pub built_at: DateTime<Utc>,
    entries: Vec<IndexedSnippet>,
}

impl KnowledgeIndex {
    pub async fn build(
        corpus: &Corpus,
        embedder: &dyn EmbeddingProvider,
        cancel: &CancellationToken,
    ) -> Result<Self, KnowledgeError> {
        let embeddings = embedder.embed(&corpus.documents, cancel).await?;
        if embeddings.len() != corpus.documents.len() {
            return Err(KnowledgeError::EmbeddingCount {
                expected: corpus.documents.len(),
                actual: embeddings.len(),
            });
        }

        let entries = corpus
            .documents
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(content, embedding)| IndexedSnippet { content, embedding })
            .collect();

        Ok(Self {
            embedding_model: embedder.model().to_string(),
            corpus_fingerprint: corpus.fingerprint.clone(),
            built_at: Utc::now(),
            entries,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| KnowledgeError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_slice(&raw)
            .map_err(|source| KnowledgeError::Decode { path: path.to_path_buf(), source })
    }

    pub async fn save(&self, path: &Path) -> Result<(), KnowledgeError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| KnowledgeError::Io { path: parent.to_path_buf(), source })?;
        }
        let body = serde_json::to_vec(self).map_err(KnowledgeError::Encode)?;
        tokio::fs::write(path, body)
            .await
            .map_err(|source| KnowledgeError::Io { path: path.to_path_buf(), source })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when this index was built from `corpus` with `embedding_model`.
    pub fn is_current(&self, corpus: &Corpus, embedding_model: &str) -> bool {
        self.corpus_fingerprint == corpus.fingerprint && self.embedding_model == embedding_model
    }

    /// Top `k` snippets by descending similarity; ties keep corpus order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredSnippet> {
        let mut scored: Vec<ScoredSnippet> = self
            .entries
            .iter()
            .map(|entry| ScoredSnippet {
                content: entry.content.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let mag_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Process-wide read-only retrieval over the embedded corpus.
#[derive(Clone)]
pub struct KnowledgeStore {
    index: Arc<KnowledgeIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl KnowledgeStore {
    pub fn new(index: KnowledgeIndex, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index: Arc::new(index), embedder }
    }

    /// Loads the saved index, rebuilding and saving it when it is missing,
    /// unreadable or built from a different corpus or embedding model.
    pub async fn open(
        config: &KnowledgeConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        cancel: &CancellationToken,
    ) -> Result<Self, KnowledgeError> {
        let corpus = Corpus::load(&config.corpus_path).await?;

        match KnowledgeIndex::load(&config.index_path).await {
            Ok(index) if index.is_current(&corpus, embedder.model()) => {
                info!(
                    event_name = "knowledge.index_loaded",
                    path = %config.index_path.display(),
                    documents = index.len(),
                    "knowledge index loaded"
                );
                return Ok(Self::new(index, embedder));
            }
            Ok(_) => info!(
                event_name = "knowledge.index_stale",
                path = %config.index_path.display(),
                "knowledge index is stale; rebuilding"
            ),
            Err(KnowledgeError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                info!(
                    event_name = "knowledge.index_missing",
                    path = %config.index_path.display(),
                    "knowledge index not found; building"
                )
            }
            Err(error) => warn!(
                event_name = "knowledge.index_unreadable",
                path = %config.index_path.display(),
                error = %error,
                "knowledge index unreadable; rebuilding"
            ),
        }

        let index = Self::rebuild(&corpus, &config.index_path, embedder.as_ref(), cancel).await?;
        Ok(Self::new(index, embedder))
    }

    /// Embeds `corpus` and writes the index to `index_path`.
    pub async fn rebuild(
        corpus: &Corpus,
        index_path: &Path,
        embedder: &dyn EmbeddingProvider,
        cancel: &CancellationToken,
    ) -> Result<KnowledgeIndex, KnowledgeError> {
        let index = KnowledgeIndex::build(corpus, embedder, cancel).await?;
        index.save(index_path).await?;
        info!(
            event_name = "knowledge.index_built",
            path = %index_path.display(),
            documents = index.len(),
            embedding_model = %index.embedding_model,
            "knowledge index built"
        );
        Ok(index)
    }

    pub fn index(&self) -> &KnowledgeIndex {
        &self.index
    }

    pub fn document_count(&self) -> usize {
        self.index.len()
    }
}

#[async_trait]
impl KnowledgeSearch for KnowledgeStore {
    async fn search(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<RetrievedContext, DispatchError> {
        let embeddings = self.embedder.embed(&[query.to_string()], cancel).await.map_err(
            |error| match error {
                OracleError::Cancelled => DispatchError::Cancelled,
                other => DispatchError::KnowledgeUnavailable(other.to_string()),
            },
        )?;
        let query_embedding = embeddings.into_iter().next().ok_or_else(|| {
            DispatchError::KnowledgeUnavailable("embedding provider returned no vector".to_string())
        })?;

        let snippets =
            self.index.search(&query_embedding, k).into_iter().map(|hit| hit.content).collect();
        Ok(RetrievedContext { snippets })
    }
}
