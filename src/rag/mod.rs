// Index build and retrieval
// The indexer is a fail-fast, all-or-nothing rebuild: nothing is persisted
// until every chunk of every document has embedded successfully. Retrieval
// reloads the snapshot per query and applies the score gate.


use std::fs;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::Result;
use crate::chunking::split_text;
use crate::config::Config;
use crate::embeddings::{Embedder, embedding_healthy};
use crate::store::{ChunkMetadata, VectorStore};

/// A score-gated search hit, produced per query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub score: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexSummary {
    pub docs: usize,
    pub chunks: usize,
    pub store_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagStatus {
    pub has_api_key: bool,
    pub healthy: bool,
    pub enabled_for_chat: bool,
    pub embed_model: String,
}

/// Rebuild the whole index from the markdown files directly under the docs
/// directory (non-recursive). The previous snapshot is replaced wholesale;
/// any embedding failure aborts with nothing written.
#[inline]
pub fn reindex(embedder: &dyn Embedder, config: &Config) -> Result<ReindexSummary> {
    fs::create_dir_all(&config.docs_dir)?;
    let files = markdown_files(config)?;

    info!(
        "Reindex start: docs_dir={} files={} model={}",
        config.docs_dir.display(),
        files.len(),
        embedder.model()
    );

    let mut store = VectorStore::new(&config.store_path, embedder.model());
    let mut total_chunks = 0;

    for path in &files {
        let content = fs::read_to_string(path)?;
        let doc_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let chunks = split_text(&content, config.chunk_size, config.chunk_overlap);
        info!("Indexing {}: {} chunks", doc_name, chunks.len());

        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let vector = embedder.embed(&chunk)?;
            store.add(
                vector,
                chunk,
                ChunkMetadata {
                    doc_name: doc_name.clone(),
                    chunk_index,
                },
            );
            total_chunks += 1;
        }
    }

    store.save()?;
    info!(
        "Reindex done: files={} chunks={} store={}",
        files.len(),
        total_chunks,
        config.store_path.display()
    );

    Ok(ReindexSummary {
        docs: files.len(),
        chunks: total_chunks,
        store_path: config.store_path.to_string_lossy().into_owned(),
    })
}

/// Embed the query, search the persisted snapshot, and keep the top-k hits
/// at or above the configured score gate, best first.
#[inline]
pub fn retrieve(
    embedder: &dyn Embedder,
    config: &Config,
    query: &str,
) -> Result<Vec<RetrievedContext>> {
    let started = Instant::now();
    let query_vector = embedder.embed(query)?;

    let mut store = VectorStore::new(&config.store_path, embedder.model());
    store.load()?;

    let contexts: Vec<RetrievedContext> = store
        .search(&query_vector, config.top_k)
        .into_iter()
        .filter(|(score, _)| *score >= config.min_score)
        .map(|(score, record)| RetrievedContext {
            score: round_score(score),
            text: record.text.clone(),
            metadata: record.metadata.clone(),
        })
        .collect();

    debug!(
        "Retrieve: query_chars={} kept={}/{} took={}ms",
        query.chars().count(),
        contexts.len(),
        config.top_k,
        started.elapsed().as_millis()
    );
    Ok(contexts)
}

#[inline]
pub fn status(config: &Config) -> RagStatus {
    RagStatus {
        has_api_key: config.has_api_key(),
        healthy: config.has_api_key() && embedding_healthy(),
        enabled_for_chat: config.rag_enabled_for_chat,
        embed_model: config.embed_model.clone(),
    }
}

fn markdown_files(config: &Config) -> Result<Vec<std::path::PathBuf>> {
    let mut files: Vec<_> = fs::read_dir(&config.docs_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .collect();
    // Directory iteration order is platform-dependent; sort so record order
    // is stable across rebuilds.
    files.sort();
    Ok(files)
}

/// Scores are reported to four decimal places.
fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}
