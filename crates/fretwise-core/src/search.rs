//! Retrieval service: the `search_products` tool.
//!
//! The caller hands over a JSON filter object as text. The filter is
//! canonicalized (keys sorted) and used as the similarity query against the
//! product index; the top [`SEARCH_LIMIT`] hits come back as
//! [`ProductSummary`] values.
//!
//! Failures never escape as `Err`: a bad filter or an upstream error is
//! reported in [`SearchResponse::error`] so the agent can feed it back to
//! the model as an observation.

use serde::{Deserialize, Serialize};

use crate::index::SimilaritySearch;
use crate::models::ProductSummary;

/// Maximum number of products a search returns.
pub const SEARCH_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ProductSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    fn failed(message: impl std::fmt::Display) -> Self {
        Self {
            results: Vec::new(),
            error: Some(format!("Error searching products: {}", message)),
        }
    }

    /// JSON rendering used as a tool observation.
    pub fn to_observation(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Search the catalog with a JSON filter given as text.
pub async fn search_products(index: &dyn SimilaritySearch, query: &str) -> SearchResponse {
    let filter: serde_json::Value = match serde_json::from_str(query) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "search filter is not valid JSON");
            return SearchResponse::failed(e);
        }
    };

    let canonical = filter.to_string();
    tracing::debug!(query = %canonical, "searching products");

    match index.similarity_search(&canonical, SEARCH_LIMIT).await {
        Ok(hits) => SearchResponse {
            results: hits
                .iter()
                .take(SEARCH_LIMIT)
                .map(|h| h.record.summary())
                .collect(),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "product search failed");
            SearchResponse::failed(format!("{:#}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::embedding::HashEmbedder;
    use crate::index::{ProductHit, ProductIndex};
    use crate::models::ProductRecord;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records the query text and returns a fixed number of copies of one record.
    struct RecordingSearch {
        queries: Mutex<Vec<(String, usize)>>,
        hits: usize,
    }

    #[async_trait]
    impl SimilaritySearch for RecordingSearch {
        async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ProductHit>> {
            self.queries.lock().unwrap().push((query.to_string(), k));
            let record = Catalog::builtin().records()[0].clone();
            Ok((0..self.hits)
                .map(|_| ProductHit {
                    record: record.clone(),
                    similarity: 1.0,
                })
                .collect())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SimilaritySearch for FailingSearch {
        async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<ProductHit>> {
            anyhow::bail!("vector service unavailable")
        }
    }

    async fn builtin_index() -> ProductIndex {
        ProductIndex::build(
            Catalog::builtin().records(),
            Arc::new(HashEmbedder::default()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_both_electric_guitars() {
        let index = builtin_index().await;
        let resp = search_products(&index, r#"{"style": "Electric", "budget": 1500}"#).await;
        assert!(resp.error.is_none());
        let ids: Vec<&str> = resp.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"GTR001") && ids.contains(&"GTR002"));
    }

    #[tokio::test]
    async fn test_results_are_projections_of_catalog_records() {
        let catalog = Catalog::builtin();
        let index = builtin_index().await;
        let resp = search_products(&index, r#"{"brand": "Fender"}"#).await;
        for summary in &resp.results {
            let record: &ProductRecord = catalog.get(&summary.id).unwrap();
            assert_eq!(&record.summary(), summary);
        }
    }

    #[tokio::test]
    async fn test_search_caps_results_at_limit() {
        let search = RecordingSearch {
            queries: Mutex::new(Vec::new()),
            hits: 9,
        };
        let resp = search_products(&search, "{}").await;
        assert_eq!(resp.results.len(), SEARCH_LIMIT);
        assert_eq!(search.queries.lock().unwrap()[0].1, SEARCH_LIMIT);
    }

    #[tokio::test]
    async fn test_filter_is_canonicalized() {
        let search = RecordingSearch {
            queries: Mutex::new(Vec::new()),
            hits: 0,
        };
        search_products(&search, r#"{"style": "Electric", "budget": 1500}"#).await;
        search_products(&search, r#"{ "budget": 1500, "style": "Electric" }"#).await;
        let queries = search.queries.lock().unwrap();
        assert_eq!(queries[0].0, queries[1].0);
    }

    #[tokio::test]
    async fn test_invalid_filter_reports_inline_error() {
        let index = builtin_index().await;
        let resp = search_products(&index, "electric please").await;
        assert!(resp.results.is_empty());
        assert!(resp
            .error
            .as_deref()
            .unwrap()
            .starts_with("Error searching products:"));
    }

    #[tokio::test]
    async fn test_upstream_failure_reports_inline_error() {
        let resp = search_products(&FailingSearch, "{}").await;
        assert!(resp.error.unwrap().contains("vector service unavailable"));
    }

    #[tokio::test]
    async fn test_observation_omits_error_when_ok() {
        let resp = SearchResponse::default();
        assert_eq!(resp.to_observation(), r#"{"results":[]}"#);
    }
}
