//! Recommendation composer.
//!
//! # Pipeline
//!
//! 1. Serialize [`Preferences`] to canonical text.
//! 2. Retrieve the [`RECOMMEND_CONTEXT_K`] most similar products.
//! 3. Render preferences and products into a fixed ranking prompt.
//! 4. Ask the completion model for `{"recommendations": [...]}`.
//! 5. Parse the reply, resolve every `product_id` against the catalog and
//!    sort by descending score.
//!
//! The model is not trusted: malformed JSON and non-numeric scores are
//! typed errors, unknown product ids are dropped.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::completion::Completion;
use crate::index::{ProductHit, SimilaritySearch};
use crate::models::{Preferences, Recommendation};

/// Number of retrieved products shown to the model.
pub const RECOMMEND_CONTEXT_K: usize = 3;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("invalid preferences: {0}")]
    InvalidPreferences(String),
    #[error("product retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),
    #[error("completion failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("model returned malformed recommendations: {0}")]
    MalformedOutput(String),
    #[error("recommendation for '{product_id}' has a non-numeric score: {value}")]
    InvalidScore { product_id: String, value: String },
}

/// Shape the model is asked to produce.
#[derive(Debug, Deserialize)]
struct CompletionPayload {
    recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    product_id: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    score: serde_json::Value,
}

pub struct Composer {
    catalog: Arc<Catalog>,
    index: Arc<dyn SimilaritySearch>,
    completion: Arc<dyn Completion>,
}

impl Composer {
    pub fn new(
        catalog: Arc<Catalog>,
        index: Arc<dyn SimilaritySearch>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self {
            catalog,
            index,
            completion,
        }
    }

    pub async fn recommend(
        &self,
        prefs: &Preferences,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        prefs
            .validate()
            .map_err(|e| RecommendError::InvalidPreferences(e.to_string()))?;

        let query = prefs.canonical_text();
        let hits = self
            .index
            .similarity_search(&query, RECOMMEND_CONTEXT_K)
            .await
            .map_err(RecommendError::Retrieval)?;

        if hits.is_empty() {
            tracing::debug!(query = %query, "no products retrieved; nothing to rank");
            return Ok(Vec::new());
        }

        let prompt = build_prompt(prefs, &render_context(&hits));
        tracing::debug!(
            products = hits.len(),
            model = self.completion.model_name(),
            "requesting recommendations"
        );
        let output = self
            .completion
            .complete(&prompt)
            .await
            .map_err(RecommendError::Completion)?;

        let mut recommendations = Vec::new();
        for (product_id, reason, score) in parse_recommendations(&output)? {
            match self.catalog.get(&product_id) {
                Some(record) => recommendations.push(Recommendation {
                    product_id,
                    reason,
                    score,
                    product: Some(record.summary()),
                }),
                None => {
                    tracing::warn!(product_id = %product_id, "dropping recommendation for unknown product")
                }
            }
        }

        recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(recommendations)
    }

    /// Tool form used by the agent: JSON preferences in, JSON or an
    /// inline error string out.
    pub async fn recommend_observation(&self, input: &str) -> String {
        let prefs: Preferences = match serde_json::from_str(input) {
            Ok(p) => p,
            Err(e) => return format!("Error generating recommendations: {}", e),
        };
        match self.recommend(&prefs).await {
            Ok(recs) => serde_json::json!({ "recommendations": recs }).to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "recommendation tool failed");
                format!("Error generating recommendations: {}", e)
            }
        }
    }
}

/// Describe retrieved products for the prompt.
pub fn render_context(hits: &[ProductHit]) -> String {
    hits.iter()
        .map(|h| {
            let r = &h.record;
            format!(
                "Product: {} ({})\nID: {}\nType: {}\nPrice: ${:.2}\nFeatures: {}\nDescription: {}\n",
                r.name,
                r.brand,
                r.id,
                r.style,
                r.price,
                r.features.join(", "),
                r.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(prefs: &Preferences, context: &str) -> String {
    format!(
        r#"Based on the user preferences: {preferences}
and considering the following guitar products:

{context}
Provide personalized recommendations for the user. Consider factors like:
- User's budget constraints
- Preferred guitar type
- Preferred features
- Brand preferences
- Price range

Only recommend products listed above, using their ID as product_id.
Format your response as a JSON object with the following structure:
{{
    "recommendations": [
        {{
            "product_id": "",
            "reason": "",
            "score": 0.0
        }}
    ]
}}"#,
        preferences = prefs.canonical_text(),
        context = context,
    )
}

/// Parse model output into `(product_id, reason, score)` triples.
///
/// A Markdown code fence around the JSON is tolerated; nothing else is
/// repaired.
fn parse_recommendations(text: &str) -> Result<Vec<(String, String, f64)>, RecommendError> {
    let payload: CompletionPayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| RecommendError::MalformedOutput(e.to_string()))?;

    payload
        .recommendations
        .into_iter()
        .map(|raw| {
            let score = parse_score(&raw.score).ok_or_else(|| RecommendError::InvalidScore {
                product_id: raw.product_id.clone(),
                value: raw.score.to_string(),
            })?;
            Ok((raw.product_id, raw.reason, score))
        })
        .collect()
}

fn parse_score(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::index::ProductIndex;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Completion stub that returns a fixed reply and records prompts.
    struct Scripted {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Completion for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct EmptySearch;

    #[async_trait]
    impl SimilaritySearch for EmptySearch {
        async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<ProductHit>> {
            Ok(Vec::new())
        }
    }

    async fn composer_with(reply: &str) -> (Composer, Arc<Scripted>) {
        let catalog = Arc::new(Catalog::builtin());
        let index = ProductIndex::build(catalog.records(), Arc::new(HashEmbedder::default()))
            .await
            .unwrap();
        let completion = Scripted::new(reply);
        (
            Composer::new(catalog, Arc::new(index), completion.clone()),
            completion,
        )
    }

    fn electric_under_1500() -> Preferences {
        Preferences {
            budget: Some(1500.0),
            style: Some("Electric".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_recommend_resolves_and_sorts() {
        let (composer, completion) = composer_with(
            r#"{"recommendations": [
                {"product_id": "GTR002", "reason": "Great sustain", "score": "0.6"},
                {"product_id": "GTR001", "reason": "Within budget", "score": 0.95}
            ]}"#,
        )
        .await;

        let recs = composer.recommend(&electric_under_1500()).await.unwrap();
        let ids: Vec<&str> = recs.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids, vec!["GTR001", "GTR002"]);
        assert_eq!(recs[0].product.as_ref().unwrap().name, "Fender Stratocaster");
        assert!((recs[1].score - 0.6).abs() < 1e-9);

        let prompts = completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("ID: GTR001"));
        assert!(prompts[0].contains("budget constraints"));
    }

    #[tokio::test]
    async fn test_unknown_products_are_dropped() {
        let (composer, _) = composer_with(
            r#"{"recommendations": [
                {"product_id": "GTR999", "reason": "made up", "score": 1.0},
                {"product_id": "GTR002", "reason": "real", "score": 0.5}
            ]}"#,
        )
        .await;
        let recs = composer.recommend(&electric_under_1500()).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].product_id, "GTR002");
    }

    #[tokio::test]
    async fn test_no_retrieved_products_returns_empty_without_model_call() {
        let completion = Scripted::new("not json at all");
        let composer = Composer::new(
            Arc::new(Catalog::builtin()),
            Arc::new(EmptySearch),
            completion.clone(),
        );
        let recs = composer.recommend(&electric_under_1500()).await.unwrap();
        assert!(recs.is_empty());
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_output_is_typed_error() {
        let (composer, _) = composer_with("Sure! I'd recommend the Strat.").await;
        let err = composer.recommend(&electric_under_1500()).await.unwrap_err();
        assert!(matches!(err, RecommendError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_non_numeric_score_is_typed_error() {
        let (composer, _) = composer_with(
            r#"{"recommendations": [{"product_id": "GTR001", "reason": "x", "score": "high"}]}"#,
        )
        .await;
        let err = composer.recommend(&electric_under_1500()).await.unwrap_err();
        assert!(matches!(err, RecommendError::InvalidScore { .. }));
    }

    #[tokio::test]
    async fn test_invalid_budget_rejected_before_retrieval() {
        let (composer, completion) = composer_with("{}").await;
        let prefs = Preferences {
            budget: Some(-10.0),
            ..Default::default()
        };
        let err = composer.recommend(&prefs).await.unwrap_err();
        assert!(matches!(err, RecommendError::InvalidPreferences(_)));
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observation_reports_inline_errors() {
        let (composer, _) = composer_with("{}").await;
        let out = composer.recommend_observation("{bad").await;
        assert!(out.starts_with("Error generating recommendations:"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[test]
    fn test_parse_score_variants() {
        assert_eq!(parse_score(&serde_json::json!(0.5)), Some(0.5));
        assert_eq!(parse_score(&serde_json::json!(" 8 ")), Some(8.0));
        assert_eq!(parse_score(&serde_json::json!("")), None);
        assert_eq!(parse_score(&serde_json::Value::Null), None);
    }
}
