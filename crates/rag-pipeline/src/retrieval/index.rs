//! Per-run in-memory vector index

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::RetrievedChunk;

struct Entry {
    id: String,
    text: String,
    vector: Vec<f32>,
}

/// Exact nearest-neighbour index over squared Euclidean distance
///
/// Each pipeline run builds its own index and drops it when the run ends.
pub struct VectorIndex {
    name: String,
    dimensions: Option<usize>,
    ids: HashSet<String>,
    entries: Vec<Entry>,
}

impl VectorIndex {
    /// Create an empty index
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimensions: None,
            ids: HashSet::new(),
            entries: Vec::new(),
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add documents with their vectors. The batch is rejected as a whole
    /// when lengths differ, an id repeats, or a vector has the wrong dimension.
    pub fn add(&mut self, ids: Vec<String>, documents: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if ids.len() != documents.len() || ids.len() != vectors.len() {
            return Err(Error::vector_index(format!(
                "Length mismatch: {} ids, {} documents, {} vectors",
                ids.len(),
                documents.len(),
                vectors.len()
            )));
        }

        let mut dimensions = self.dimensions;
        let mut batch_ids = HashSet::with_capacity(ids.len());
        for (id, vector) in ids.iter().zip(&vectors) {
            if self.ids.contains(id) || !batch_ids.insert(id.as_str()) {
                return Err(Error::vector_index(format!("Duplicate id: {}", id)));
            }
            match dimensions {
                Some(d) if d != vector.len() => {
                    return Err(Error::vector_index(format!(
                        "Dimension mismatch for id {}: expected {}, got {}",
                        id,
                        d,
                        vector.len()
                    )));
                }
                Some(_) => {}
                None => dimensions = Some(vector.len()),
            }
        }

        self.dimensions = dimensions;
        for ((id, text), vector) in ids.into_iter().zip(documents).zip(vectors) {
            self.ids.insert(id.clone());
            self.entries.push(Entry { id, text, vector });
        }

        tracing::debug!("Index {} holds {} entries", self.name, self.entries.len());
        Ok(())
    }

    /// The `n` nearest entries by ascending distance; ties keep insertion order
    pub fn query(&self, vector: &[f32], n: usize) -> Result<Vec<RetrievedChunk>> {
        if self.entries.is_empty() || n == 0 {
            return Ok(Vec::new());
        }
        if let Some(d) = self.dimensions {
            if d != vector.len() {
                return Err(Error::vector_index(format!(
                    "Query dimension mismatch: expected {}, got {}",
                    d,
                    vector.len()
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, squared_l2(&entry.vector, vector)))
            .collect();

        // Stable sort keeps insertion order among equal distances
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(n)
            .map(|(i, distance)| {
                let entry = &self.entries[i];
                RetrievedChunk {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    distance,
                }
            })
            .collect())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
