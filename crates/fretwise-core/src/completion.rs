//! Text-completion collaborator.
//!
//! The language model is opaque to the core: a prompt goes in, text comes
//! out, and nothing about the shape of that text is guaranteed. Concrete
//! providers live in the `fretwise` app crate.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Completion: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
