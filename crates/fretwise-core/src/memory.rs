//! Bounded conversation memory.
//!
//! Turns are kept in a ring buffer of fixed capacity and mirrored into a
//! dedicated [`VectorIndex`] so past turns can be recalled by similarity.
//! When the buffer is full the oldest turn is evicted from both. Product
//! data never enters this index.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::embedding::{embed_query, Embedder};
use crate::index::{EmbeddingEntry, VectorIndex};
use crate::models::{ChatTurn, Role};

pub struct ConversationMemory {
    embedder: Arc<dyn Embedder>,
    capacity: usize,
    turns: RwLock<VecDeque<ChatTurn>>,
    index: VectorIndex<ChatTurn>,
}

impl ConversationMemory {
    /// Create an empty memory holding at most `capacity` turns (minimum 1).
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            embedder,
            capacity,
            turns: RwLock::new(VecDeque::with_capacity(capacity)),
            index: VectorIndex::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.turns.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a turn, evicting the oldest ones beyond capacity.
    pub async fn record(&self, role: Role, text: &str) -> Result<ChatTurn> {
        let turn = ChatTurn::new(role, text);
        let vector = embed_query(self.embedder.as_ref(), text).await?;

        let mut turns = self.turns.write().unwrap();
        turns.push_back(turn.clone());
        self.index.insert(EmbeddingEntry {
            vector,
            source_text: turn.text.clone(),
            metadata: turn.clone(),
        });
        while turns.len() > self.capacity {
            if let Some(evicted) = turns.pop_front() {
                self.index.remove_where(|t| t.id == evicted.id);
                tracing::debug!(turn = %evicted.id, "evicted conversation turn");
            }
        }
        Ok(turn)
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ChatTurn> {
        let turns = self.turns.read().unwrap();
        let skip = turns.len().saturating_sub(n);
        turns.iter().skip(skip).cloned().collect()
    }

    /// Up to `k` stored turns most similar to `query`.
    pub async fn recall(&self, query: &str, k: usize) -> Result<Vec<ChatTurn>> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        Ok(self
            .index
            .search_vector(&query_vec, k)
            .into_iter()
            .filter(|s| s.similarity > 0.0)
            .map(|s| s.metadata)
            .collect())
    }

    pub fn clear(&self) {
        let mut turns = self.turns.write().unwrap();
        turns.clear();
        self.index.replace_all(Vec::new());
    }
}
