//! The in-memory product catalog.
//!
//! A [`Catalog`] is loaded once at startup and never updated. Loading
//! validates that ids are unique and prices are sane; everything
//! downstream (index, composer, agent) relies on that.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::models::ProductRecord;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ProductRecord>,
}

/// On-disk TOML layout: a list of `[[products]]` tables.
#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<ProductRecord>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate or empty ids and invalid prices.
    pub fn from_records(records: Vec<ProductRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        for r in &records {
            if r.id.trim().is_empty() {
                bail!("product id must not be empty (name: '{}')", r.name);
            }
            if !seen.insert(r.id.as_str()) {
                bail!("duplicate product id: {}", r.id);
            }
            if !r.price.is_finite() || r.price < 0.0 {
                bail!("product {} has invalid price {}", r.id, r.price);
            }
        }
        Ok(Self { records })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(content).context("Failed to parse catalog TOML")?;
        Self::from_records(file.products)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let records: Vec<ProductRecord> =
            serde_json::from_str(content).context("Failed to parse catalog JSON")?;
        Self::from_records(records)
    }

    /// The seed catalog used when no catalog file is configured.
    pub fn builtin() -> Self {
        Self {
            records: vec![
                ProductRecord {
                    id: "GTR001".to_string(),
                    name: "Fender Stratocaster".to_string(),
                    brand: "Fender".to_string(),
                    price: 1299.99,
                    style: "Electric".to_string(),
                    features: vec![
                        "Single-coil pickups".to_string(),
                        "Tremolo bridge".to_string(),
                        "Maple neck".to_string(),
                    ],
                    description:
                        "Classic electric guitar with versatile sound and iconic design."
                            .to_string(),
                },
                ProductRecord {
                    id: "GTR002".to_string(),
                    name: "Gibson Les Paul".to_string(),
                    brand: "Gibson".to_string(),
                    price: 1699.99,
                    style: "Electric".to_string(),
                    features: vec![
                        "Humbucker pickups".to_string(),
                        "Mahogany body".to_string(),
                        "Rosewood fretboard".to_string(),
                    ],
                    description:
                        "Premium electric guitar with rich, warm tone and excellent sustain."
                            .to_string(),
                },
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&ProductRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct brand names, in catalog order.
    pub fn brands(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.brand.to_lowercase()))
            .map(|r| r.brand.clone())
            .collect()
    }

    /// Distinct feature strings, in catalog order.
    pub fn features(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .flat_map(|r| r.features.iter())
            .filter(|f| seen.insert(f.to_lowercase()))
            .cloned()
            .collect()
    }
}
