// File-backed vector store
// One JSON snapshot per index: the embedding model tag plus an ordered list
// of records. Search is a linear cosine scan, which is plenty for a
// documentation-sized corpus.


use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Provenance of a stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_name: String,
    pub chunk_index: usize,
}

/// Persisted unit of the index. Never mutated after creation; a reindex
/// replaces the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Deserialize)]
struct StoreSnapshot {
    model: String,
    items: Vec<VectorRecord>,
}

#[derive(Serialize)]
struct StoreSnapshotRef<'a> {
    model: &'a str,
    items: &'a [VectorRecord],
}

/// Ordered collection of embedded chunks persisted to a single JSON file.
///
/// All vectors in one store are expected to come from the embedding model
/// recorded in `model`; the tag is stored so a mismatch is at least visible,
/// but nothing beyond a rebuild guards against mixing models.
#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    pub model: String,
    pub items: Vec<VectorRecord>,
}

impl VectorStore {
    #[inline]
    pub fn new(path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            model: model.into(),
            items: Vec::new(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Read the persisted snapshot. A missing file is an empty store, not an
    /// error.
    #[inline]
    pub fn load(&mut self) -> Result<()> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.items.clear();
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let snapshot: StoreSnapshot = serde_json::from_str(&raw).map_err(|err| {
            RagError::Format(format!(
                "invalid vector store file {}: {err}",
                self.path.display()
            ))
        })?;

        self.model = snapshot.model;
        self.items = snapshot.items;
        debug!(
            "Loaded vector store from {} ({} records, model {})",
            self.path.display(),
            self.items.len(),
            self.model
        );
        Ok(())
    }

    /// Serialize the full snapshot, creating parent directories as needed.
    /// This is a wholesale overwrite, never an on-disk append.
    #[inline]
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let snapshot = StoreSnapshotRef {
            model: &self.model,
            items: &self.items,
        };
        let raw = serde_json::to_string(&snapshot)
            .map_err(|err| RagError::Format(format!("failed to serialize vector store: {err}")))?;
        fs::write(&self.path, raw)?;

        debug!(
            "Saved vector store to {} ({} records)",
            self.path.display(),
            self.items.len()
        );
        Ok(())
    }

    /// Append a record, fingerprinting it from its content so identical
    /// chunks get identical ids across rebuilds.
    #[inline]
    pub fn add(&mut self, vector: Vec<f32>, text: String, metadata: ChunkMetadata) {
        let id = fingerprint(&metadata, &text);
        self.items.push(VectorRecord {
            id,
            vector,
            text,
            metadata,
        });
    }

    /// Rank every record by cosine similarity against `query`, best first,
    /// and return at most `top_k` of them.
    #[inline]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(f32, &VectorRecord)> {
        let mut scored: Vec<(f32, &VectorRecord)> = self
            .items
            .iter()
            .map(|record| (cosine_similarity(query, &record.vector), record))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Content fingerprint of a record: stable across rebuilds for identical
/// (doc, index, text) so external consumers can deduplicate.
fn fingerprint(metadata: &ChunkMetadata, text: &str) -> String {
    let digest = md5::compute(format!(
        "{}{}{}",
        metadata.doc_name, metadata.chunk_index, text
    ));
    format!("{digest:x}")
}

/// Cosine similarity over the common prefix of the two vectors.
/// A zero-norm operand scores 0.0 rather than producing NaN.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
