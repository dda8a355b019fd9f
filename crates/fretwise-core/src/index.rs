//! Brute-force vector indices.
//!
//! [`VectorIndex`] stores [`EmbeddingEntry`] values behind a `RwLock` and
//! ranks them by cosine similarity. It backs both the product index and
//! the conversation memory, which are kept as separate instances.
//!
//! [`ProductIndex`] embeds every catalog description once at build time
//! and answers free-text queries through the [`SimilaritySearch`] trait.

use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::ProductRecord;

/// A stored vector together with the text it was computed from.
#[derive(Debug, Clone)]
pub struct EmbeddingEntry<M> {
    pub vector: Vec<f32>,
    pub source_text: String,
    pub metadata: M,
}

/// A search hit: the entry's metadata and its cosine similarity.
#[derive(Debug, Clone)]
pub struct Scored<M> {
    pub metadata: M,
    pub source_text: String,
    pub similarity: f32,
}

/// In-memory vector index with exhaustive cosine search.
pub struct VectorIndex<M> {
    entries: RwLock<Vec<EmbeddingEntry<M>>>,
}

impl<M: Clone> VectorIndex<M> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, entry: EmbeddingEntry<M>) {
        self.entries.write().unwrap().push(entry);
    }

    /// Remove every entry whose metadata matches `pred`. Returns the count removed.
    pub fn remove_where(&self, pred: impl Fn(&M) -> bool) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|e| !pred(&e.metadata));
        before - entries.len()
    }

    /// Replace all entries at once.
    pub fn replace_all(&self, new_entries: Vec<EmbeddingEntry<M>>) {
        *self.entries.write().unwrap() = new_entries;
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-`k` entries by descending similarity. Ties keep insertion order.
    pub fn search_vector(&self, query_vec: &[f32], k: usize) -> Vec<Scored<M>> {
        if k == 0 {
            return Vec::new();
        }
        let entries = self.entries.read().unwrap();
        let mut hits: Vec<Scored<M>> = entries
            .iter()
            .map(|e| Scored {
                metadata: e.metadata.clone(),
                source_text: e.source_text.clone(),
                similarity: nan_to_zero(cosine_similarity(query_vec, &e.vector)),
            })
            .collect();
        // sort_by is stable, so equal scores stay in insertion order
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        hits
    }
}

/// Vectors with overflowed components score NaN; rank them as unrelated.
fn nan_to_zero(similarity: f32) -> f32 {
    if similarity.is_nan() {
        0.0
    } else {
        similarity
    }
}

impl<M: Clone> Default for VectorIndex<M> {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Product index ============

/// A product returned from similarity search.
#[derive(Debug, Clone)]
pub struct ProductHit {
    pub record: ProductRecord,
    pub similarity: f32,
}

/// The vector-search collaborator used by retrieval and composition.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return at most `k` products ranked by similarity to `query`.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ProductHit>>;
}

/// Embedding index over the catalog's product descriptions.
pub struct ProductIndex {
    embedder: Arc<dyn Embedder>,
    entries: VectorIndex<ProductRecord>,
}

impl ProductIndex {
    /// Embed each record's description and build the index.
    pub async fn build(records: &[ProductRecord], embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index = Self {
            embedder,
            entries: VectorIndex::new(),
        };
        index.rebuild(records).await?;
        Ok(index)
    }

    /// Drop every entry and re-embed `records`.
    pub async fn rebuild(&self, records: &[ProductRecord]) -> Result<()> {
        let entries = embed_records(self.embedder.as_ref(), records).await?;
        self.entries.replace_all(entries);
        tracing::info!(
            products = records.len(),
            model = self.embedder.model_name(),
            "product index built"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ProductHit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        Ok(self
            .entries
            .search_vector(&query_vec, k)
            .into_iter()
            .map(|s| ProductHit {
                record: s.metadata,
                similarity: s.similarity,
            })
            .collect())
    }
}

#[async_trait]
impl SimilaritySearch for ProductIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ProductHit>> {
        self.search(query, k).await
    }
}

async fn embed_records(
    embedder: &dyn Embedder,
    records: &[ProductRecord],
) -> Result<Vec<EmbeddingEntry<ProductRecord>>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let texts: Vec<String> = records
        .iter()
        .map(|r| r.embedding_text().to_string())
        .collect();
    let vectors = embedder.embed(&texts).await?;
    if vectors.len() != records.len() {
        bail!(
            "embedder returned {} vectors for {} products",
            vectors.len(),
            records.len()
        );
    }
    Ok(records
        .iter()
        .zip(vectors)
        .map(|(r, vector)| EmbeddingEntry {
            vector,
            source_text: r.embedding_text().to_string(),
            metadata: r.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::embedding::HashEmbedder;

    fn entry(id: &str, vector: Vec<f32>) -> EmbeddingEntry<String> {
        EmbeddingEntry {
            vector,
            source_text: id.to_string(),
            metadata: id.to_string(),
        }
    }

    #[test]
    fn test_search_vector_orders_by_similarity() {
        let index = VectorIndex::new();
        index.insert(entry("far", vec![0.0, 1.0]));
        index.insert(entry("near", vec![1.0, 0.1]));
        let hits = index.search_vector(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata, "near");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[test]
    fn test_search_vector_tolerates_overflowed_vectors() {
        let index = VectorIndex::new();
        index.insert(entry("overflowed", vec![f32::INFINITY, 0.0]));
        index.insert(entry("ok", vec![1.0, 0.0]));
        index.insert(entry("nan", vec![f32::NAN, 1.0]));
        let hits = index.search_vector(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].metadata, "ok");
        assert!(hits.iter().all(|h| !h.similarity.is_nan()));
    }

    #[test]
    fn test_search_vector_k_zero() {
        let index = VectorIndex::new();
        index.insert(entry("a", vec![1.0]));
        assert!(index.search_vector(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = VectorIndex::new();
        index.insert(entry("first", vec![1.0, 0.0]));
        index.insert(entry("second", vec![1.0, 0.0]));
        let hits = index.search_vector(&[1.0, 0.0], 2);
        assert_eq!(hits[0].metadata, "first");
        assert_eq!(hits[1].metadata, "second");
    }

    #[test]
    fn test_remove_where() {
        let index = VectorIndex::new();
        index.insert(entry("a", vec![1.0]));
        index.insert(entry("b", vec![1.0]));
        assert_eq!(index.remove_where(|m| m == "a"), 1);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_product_index_returns_all_when_k_exceeds_len() {
        let catalog = Catalog::builtin();
        let index = ProductIndex::build(catalog.records(), Arc::new(HashEmbedder::default()))
            .await
            .unwrap();
        assert_eq!(index.len(), 2);
        let hits = index.search("electric guitar", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn test_product_index_empty_catalog() {
        let index = ProductIndex::build(&[], Arc::new(HashEmbedder::default()))
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(index.search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_product_index_k_zero() {
        let catalog = Catalog::builtin();
        let index = ProductIndex::build(catalog.records(), Arc::new(HashEmbedder::default()))
            .await
            .unwrap();
        assert!(index.search("electric", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_replaces_entries() {
        let catalog = Catalog::builtin();
        let index = ProductIndex::build(catalog.records(), Arc::new(HashEmbedder::default()))
            .await
            .unwrap();
        index.rebuild(&catalog.records()[..1]).await.unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_closest_description_ranks_first() {
        let catalog = Catalog::builtin();
        let index = ProductIndex::build(catalog.records(), Arc::new(HashEmbedder::default()))
            .await
            .unwrap();
        let hits = index
            .search("rich warm tone and excellent sustain", 2)
            .await
            .unwrap();
        assert_eq!(hits[0].record.id, "GTR002");
    }
}
