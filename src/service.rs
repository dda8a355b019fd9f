//! The advisor service object.
//!
//! [`Advisor`] owns everything a request needs: the catalog, the product
//! index, the recommendation composer and the conversational agent. It is
//! built once at startup (from config with [`Advisor::build`], or from
//! ready-made collaborators with [`Advisor::from_parts`]) and shared as
//! `Arc<Advisor>` by the HTTP server and the CLI.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fretwise_core::agent::{Agent, AgentReply, AgentSettings, IntentClassifier};
use fretwise_core::catalog::Catalog;
use fretwise_core::completion::Completion;
use fretwise_core::composer::{Composer, RecommendError};
use fretwise_core::embedding::Embedder;
use fretwise_core::index::{ProductIndex, SimilaritySearch};
use fretwise_core::memory::ConversationMemory;
use fretwise_core::models::{Preferences, Recommendation};
use fretwise_core::search::{search_products, SearchResponse};

use crate::completion::create_completion;
use crate::config::{Config, MemoryConfig};
use crate::embedding::create_embedder;

/// Load the catalog named by `[catalog] path`, or the built-in one.
///
/// The file format is chosen by extension: `.json` is an array of
/// products, anything else is TOML with `[[products]]` tables.
pub fn load_catalog(config: &Config) -> Result<Catalog> {
    let Some(path) = &config.catalog.path else {
        return Ok(Catalog::builtin());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let catalog = if is_json(path) {
        Catalog::from_json_str(&content)?
    } else {
        Catalog::from_toml_str(&content)?
    };
    tracing::info!(path = %path.display(), products = catalog.len(), "catalog loaded");
    Ok(catalog)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub struct Advisor {
    catalog: Arc<Catalog>,
    index: Arc<ProductIndex>,
    composer: Arc<Composer>,
    agent: Agent,
}

impl Advisor {
    /// Load the catalog, create providers and embed the catalog.
    pub async fn build(config: &Config) -> Result<Self> {
        let catalog = load_catalog(config)?;
        let embedder = create_embedder(&config.embedding)?;
        let completion = create_completion(&config.completion)?;
        tracing::info!(
            embedder = embedder.model_name(),
            completion = completion.model_name(),
            "building advisor"
        );
        Self::from_parts(catalog, embedder, completion, &config.memory).await
    }

    /// Assemble an advisor from explicit collaborators.
    pub async fn from_parts(
        catalog: Catalog,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn Completion>,
        memory: &MemoryConfig,
    ) -> Result<Self> {
        let catalog = Arc::new(catalog);
        let index = Arc::new(
            ProductIndex::build(catalog.records(), embedder.clone())
                .await
                .context("Failed to build product index")?,
        );
        let search: Arc<dyn SimilaritySearch> = index.clone();
        let composer = Arc::new(Composer::new(
            catalog.clone(),
            search.clone(),
            completion.clone(),
        ));
        let agent = Agent::new(
            search,
            composer.clone(),
            completion,
            ConversationMemory::new(embedder, memory.capacity),
            IntentClassifier::from_catalog(&catalog),
            AgentSettings {
                recall_k: memory.recall_k,
                history_window: memory.history_window,
            },
        );

        Ok(Self {
            catalog,
            index,
            composer,
            agent,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub async fn recommend(
        &self,
        prefs: &Preferences,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        self.composer.recommend(prefs).await
    }

    pub async fn chat(&self, message: &str) -> Result<AgentReply> {
        self.agent.respond(message).await
    }

    pub async fn search(&self, query: &str) -> SearchResponse {
        search_products(self.index.as_ref(), query).await
    }

    /// Release per-process state. Conversation memory is not persisted.
    pub fn shutdown(&self) {
        let turns = self.agent.memory().len();
        self.agent.memory().clear();
        tracing::info!(
            turns_discarded = turns,
            indexed_products = self.index.len(),
            "advisor shut down"
        );
    }
}
