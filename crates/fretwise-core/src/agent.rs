//! Conversational agent.
//!
//! Each call to [`Agent::respond`] handles one user turn:
//!
//! 1. [`IntentClassifier`] maps the message to an [`Action`].
//! 2. At most one tool runs: product search or the recommendation composer.
//! 3. Related memory turns and recent history are gathered.
//! 4. The completion model writes the reply from that context.
//! 5. Both turns are appended to [`ConversationMemory`].
//!
//! Tool choice is made here, in code; the model only writes prose.

use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::completion::Completion;
use crate::composer::{Composer, RECOMMEND_CONTEXT_K};
use crate::index::{ProductHit, SimilaritySearch};
use crate::memory::ConversationMemory;
use crate::models::{ChatTurn, Preferences, Role};
use crate::search::search_products;

/// What the agent decided to do with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Run `search_products` with a JSON filter.
    Search { query: String },
    /// Run the recommendation composer.
    Recommend { preferences: Preferences },
    /// Answer directly without a tool.
    Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Search,
    Recommend,
    Reply,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Search { .. } => ActionKind::Search,
            Action::Recommend { .. } => ActionKind::Recommend,
            Action::Reply => ActionKind::Reply,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Intent classification
// ═══════════════════════════════════════════════════════════════════════

const RECOMMEND_CUES: &[&str] = &[
    "recommend",
    "suggest",
    "should i buy",
    "should i get",
    "best",
    "looking for",
    "advice",
    "which guitar",
    "what guitar",
    "i want",
    "i need",
];

const SEARCH_CUES: &[&str] = &[
    "search",
    "find",
    "show",
    "list",
    "do you have",
    "do you sell",
    "available",
    "in stock",
    "options",
];

const BUDGET_CUES: &[&str] = &[
    "under", "below", "budget", "less than", "up to", "max", "around", "about", "spend", "within",
];

const STYLES: &[(&str, &str)] = &[
    ("electric", "Electric"),
    ("acoustic", "Acoustic"),
    ("classical", "Classical"),
    ("nylon", "Classical"),
    ("bass", "Bass"),
];

const LEVELS: &[(&str, &str)] = &[
    ("beginner", "beginner"),
    ("first guitar", "beginner"),
    ("novice", "beginner"),
    ("intermediate", "intermediate"),
    ("advanced", "expert"),
    ("expert", "expert"),
    ("professional", "expert"),
];

/// Words too generic to identify a feature on their own.
const GENERIC_FEATURE_WORDS: &[&str] = &["single", "pickups", "pickup", "guitar"];

fn amount_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\$\s?)?(\d[\d,]*(?:\.\d+)?)(\s?k\b)?").expect("amount regex is valid")
    })
}

/// Deterministic, keyword-based mapping from a chat message to an [`Action`].
#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    brands: Vec<String>,
    features: Vec<String>,
}

impl IntentClassifier {
    pub fn new(brands: Vec<String>, features: Vec<String>) -> Self {
        Self { brands, features }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(catalog.brands(), catalog.features())
    }

    pub fn classify(&self, message: &str) -> Action {
        let lower = message.to_lowercase();
        let preferences = self.extract_preferences(message);

        if contains_any(&lower, RECOMMEND_CUES) {
            return Action::Recommend { preferences };
        }
        if contains_any(&lower, SEARCH_CUES) {
            let query = if preferences.is_empty() {
                serde_json::json!({ "query": message.trim() }).to_string()
            } else {
                preferences.canonical_text()
            };
            return Action::Search { query };
        }
        if !preferences.is_empty() {
            return Action::Recommend { preferences };
        }
        Action::Reply
    }

    /// Pull whatever structured preferences the message states.
    pub fn extract_preferences(&self, message: &str) -> Preferences {
        let lower = message.to_lowercase();

        let style = STYLES
            .iter()
            .find(|(kw, _)| contains_word(&lower, kw))
            .map(|(_, s)| s.to_string());

        let experience_level = LEVELS
            .iter()
            .find(|(kw, _)| lower.contains(kw))
            .map(|(_, l)| l.to_string());

        let brand = self
            .brands
            .iter()
            .find(|b| contains_word(&lower, &b.to_lowercase()))
            .cloned();

        let features = self
            .features
            .iter()
            .filter(|f| feature_mentioned(&lower, f))
            .cloned()
            .collect();

        Preferences {
            budget: extract_budget(&lower),
            style,
            brand,
            features,
            experience_level,
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| contains_word(haystack, n))
}

/// Substring match on word boundaries; a plural `s`/`es` suffix is allowed.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let rest = &haystack[i + needle.len()..];
        let rest = rest
            .strip_prefix("es")
            .or_else(|| rest.strip_prefix('s'))
            .unwrap_or(rest);
        !before.is_some_and(|c| c.is_alphanumeric())
            && !rest.chars().next().is_some_and(|c| c.is_alphanumeric())
    })
}

fn feature_mentioned(lower: &str, feature: &str) -> bool {
    let feature = feature.to_lowercase();
    if lower.contains(&feature) || lower.contains(&feature.replace('-', " ")) {
        return true;
    }
    feature
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| w.len() >= 5 && !GENERIC_FEATURE_WORDS.contains(w))
        .is_some_and(|head| lower.contains(head))
}

/// First amount that reads like money: `$1500`, `1.5k`, `1,200 dollars`,
/// or a bare number right after a budget word such as "under".
fn extract_budget(lower: &str) -> Option<f64> {
    for caps in amount_regex().captures_iter(lower) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let has_dollar = caps.get(1).is_some();
        let has_k = caps.get(3).is_some();
        let prefix = &lower[..whole.start()];
        let suffix = lower[whole.end()..].trim_start();
        let cued = BUDGET_CUES
            .iter()
            .any(|cue| prefix.trim_end().ends_with(cue))
            || ["dollars", "usd", "bucks"]
                .iter()
                .any(|w| suffix.starts_with(w));

        if !(has_dollar || has_k || cued) {
            continue;
        }
        let Ok(mut value) = number.as_str().replace(',', "").parse::<f64>() else {
            continue;
        };
        if has_k {
            value *= 1000.0;
        }
        return Some(value);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════
// Agent
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Past turns recalled by similarity for each message.
    pub recall_k: usize,
    /// Most recent turns always shown to the model.
    pub history_window: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            recall_k: 3,
            history_window: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub response: String,
    pub action: ActionKind,
}

/// Products and past turns related to a query, gathered from both indices.
#[derive(Debug, Clone, Default)]
pub struct RecalledContext {
    pub products: Vec<ProductHit>,
    pub turns: Vec<ChatTurn>,
}

pub struct Agent {
    index: Arc<dyn SimilaritySearch>,
    composer: Arc<Composer>,
    completion: Arc<dyn Completion>,
    memory: ConversationMemory,
    classifier: IntentClassifier,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(
        index: Arc<dyn SimilaritySearch>,
        composer: Arc<Composer>,
        completion: Arc<dyn Completion>,
        memory: ConversationMemory,
        classifier: IntentClassifier,
        settings: AgentSettings,
    ) -> Self {
        Self {
            index,
            composer,
            completion,
            memory,
            classifier,
            settings,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Query the product index and the conversation memory together.
    pub async fn gather_context(
        &self,
        query: &str,
        product_k: usize,
        turn_k: usize,
    ) -> Result<RecalledContext> {
        let products = if product_k > 0 {
            self.index.similarity_search(query, product_k).await?
        } else {
            Vec::new()
        };
        let turns = self.memory.recall(query, turn_k).await?;
        Ok(RecalledContext { products, turns })
    }

    /// Run the tool for `action`, returning its observation text.
    pub async fn run_tool(&self, action: &Action) -> Option<(&'static str, String)> {
        match action {
            Action::Search { query } => Some((
                "search_products",
                search_products(self.index.as_ref(), query)
                    .await
                    .to_observation(),
            )),
            Action::Recommend { preferences } => {
                let input = serde_json::to_string(preferences).unwrap_or_default();
                Some((
                    "recommend_products",
                    self.composer.recommend_observation(&input).await,
                ))
            }
            Action::Reply => None,
        }
    }

    /// Handle one user message and produce the agent's reply.
    pub async fn respond(&self, message: &str) -> Result<AgentReply> {
        let message = message.trim();
        if message.is_empty() {
            bail!("message must not be empty");
        }

        let action = self.classifier.classify(message);
        tracing::info!(action = ?action.kind(), "agent turn");

        let product_k = if action == Action::Reply {
            RECOMMEND_CONTEXT_K
        } else {
            0
        };
        let history = self.memory.recent(self.settings.history_window);
        let mut context = self
            .gather_context(message, product_k, self.settings.recall_k)
            .await?;
        context
            .turns
            .retain(|t| !history.iter().any(|h| h.id == t.id));

        let observation = self.run_tool(&action).await;
        let prompt = build_reply_prompt(message, &history, &context, observation.as_ref());

        let response = self
            .completion
            .complete(&prompt)
            .await
            .context("agent completion failed")?;
        let response = response.trim().to_string();

        self.memory.record(Role::User, message).await?;
        self.memory.record(Role::Agent, &response).await?;

        Ok(AgentReply {
            response,
            action: action.kind(),
        })
    }
}

fn build_reply_prompt(
    message: &str,
    history: &[ChatTurn],
    context: &RecalledContext,
    observation: Option<&(&'static str, String)>,
) -> String {
    let mut prompt = String::from(
        "You are a friendly guitar shop assistant helping a customer choose a guitar.\n\
         Base product facts only on the information below and keep the reply concise.\n",
    );

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in history {
            prompt.push_str(&format!("{}: {}\n", turn.role.label(), turn.text));
        }
    }

    if !context.turns.is_empty() {
        prompt.push_str("\nEarlier, related remarks:\n");
        for turn in &context.turns {
            prompt.push_str(&format!("- {}: {}\n", turn.role.label(), turn.text));
        }
    }

    if !context.products.is_empty() {
        prompt.push_str("\nCatalog matches:\n");
        for hit in &context.products {
            let r = &hit.record;
            prompt.push_str(&format!(
                "- {} ({}, {}, ${:.2}): {}\n",
                r.name, r.brand, r.style, r.price, r.description
            ));
        }
    }

    if let Some((tool, output)) = observation {
        prompt.push_str(&format!("\nTool used: {}\nTool result:\n{}\n", tool, output));
    }

    prompt.push_str(&format!("\nUser: {}\nAgent:", message));
    prompt
}
