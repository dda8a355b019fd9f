//! Core data models shared by the catalog, retrieval and agent layers.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A guitar in the catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub price: f64,
    /// Body style, e.g. `"Electric"`. Catalog files may call this `type`.
    #[serde(alias = "type")]
    pub style: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub description: String,
}

impl ProductRecord {
    /// Text that represents this product in the embedding space.
    pub fn embedding_text(&self) -> &str {
        &self.description
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            brand: self.brand.clone(),
            price: self.price,
            style: self.style.clone(),
            features: self.features.clone(),
        }
    }
}

/// Public-facing projection of a [`ProductRecord`], as returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub price: f64,
    #[serde(rename = "type", alias = "style")]
    pub style: String,
    pub features: Vec<String>,
}

/// Structured buyer preferences for a recommendation request.
///
/// Field order is fixed by the struct and `features` is a sorted set, so
/// [`canonical_text`](Preferences::canonical_text) is stable no matter how
/// the caller ordered the JSON keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(
        default,
        alias = "brand_preference",
        skip_serializing_if = "Option::is_none"
    )]
    pub brand: Option<String>,
    #[serde(default)]
    pub features: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
}

impl Preferences {
    /// Returns true if no preference was given at all.
    pub fn is_empty(&self) -> bool {
        self.budget.is_none()
            && self.style.is_none()
            && self.brand.is_none()
            && self.features.is_empty()
            && self.experience_level.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget < 0.0 {
                bail!("budget must be a non-negative number, got {}", budget);
            }
        }
        Ok(())
    }

    /// Canonical JSON text used as the similarity query.
    pub fn canonical_text(&self) -> String {
        // serde_json::Value maps keep their keys sorted.
        serde_json::to_value(self)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

/// One ranked suggestion produced by the recommendation composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: String,
    pub reason: String,
    pub score: f64,
    /// Catalog details for `product_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Agent => "Agent",
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
