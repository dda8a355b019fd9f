//! CLI command implementations.
//!
//! Each `run_*` function backs one `fretwise` subcommand and prints its
//! results to stdout. Logs go to stderr.

use std::io::Write;

use anyhow::{bail, Result};
use fretwise_core::catalog::Catalog;
use fretwise_core::models::{Preferences, ProductSummary};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::service::{load_catalog, Advisor};

/// `fretwise catalog`: list every product.
pub fn run_catalog(config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;
    print_catalog(&catalog);
    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    if catalog.is_empty() {
        println!("Catalog is empty.");
        return;
    }
    for record in catalog.records() {
        println!(
            "[{}] {} ({}, {}) ${:.2}",
            record.id, record.name, record.brand, record.style, record.price
        );
        if !record.features.is_empty() {
            println!("    features: {}", record.features.join(", "));
        }
    }
    println!();
    println!("{} product(s)", catalog.len());
}

/// `fretwise search QUERY`: run the retrieval tool.
///
/// A query that is not a JSON object is wrapped as `{"query": QUERY}`.
pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let advisor = Advisor::build(config).await?;
    let filter = search_filter(query);
    let resp = advisor.search(&filter).await;

    if let Some(err) = resp.error {
        bail!(err);
    }
    if resp.results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, summary) in resp.results.iter().enumerate() {
        print_summary(i + 1, summary);
    }
    Ok(())
}

fn search_filter(query: &str) -> String {
    let trimmed = query.trim();
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(v) if v.is_object() => trimmed.to_string(),
        _ => serde_json::json!({ "query": trimmed }).to_string(),
    }
}

fn print_summary(rank: usize, s: &ProductSummary) {
    println!(
        "{}. [{}] {} ({}, {}) ${:.2}",
        rank, s.id, s.name, s.brand, s.style, s.price
    );
}

/// `fretwise recommend`: rank products for the given preferences.
pub async fn run_recommend(config: &Config, prefs: Preferences) -> Result<()> {
    let advisor = Advisor::build(config).await?;
    let recs = advisor.recommend(&prefs).await?;
    if recs.is_empty() {
        println!("No recommendations.");
        return Ok(());
    }
    for (i, rec) in recs.iter().enumerate() {
        let name = rec
            .product
            .as_ref()
            .map(|p| format!("{} (${:.2})", p.name, p.price))
            .unwrap_or_default();
        println!("{}. [{}] {}  score {:.2}", i + 1, rec.product_id, name, rec.score);
        println!("    {}", rec.reason);
    }
    Ok(())
}

/// `fretwise chat`: interactive loop on stdin; `quit` exits.
pub async fn run_chat(config: &Config) -> Result<()> {
    let advisor = Advisor::build(config).await?;
    println!("Guitar advisor ready. Type 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }
        match advisor.chat(message).await {
            Ok(reply) => println!("Agent: {}\n", reply.response),
            Err(e) => eprintln!("Error: {:#}\n", e),
        }
    }

    advisor.shutdown();
    Ok(())
}
