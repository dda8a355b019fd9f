//! # fretwise core
//!
//! Runtime-agnostic logic for fretwise: the product catalog, the embedding
//! and completion traits, the vector index, the retrieval service, the
//! recommendation composer, conversation memory and the agent.
//!
//! This crate performs no network or filesystem I/O. Concrete embedding
//! and completion backends live in the `fretwise` app crate and are passed
//! in as trait objects.
//!
//! ```text
//! Agent ──▶ Composer ──▶ search ──▶ ProductIndex ──▶ Catalog
//!   │                                   ▲
//!   └──▶ ConversationMemory (own index) │ Embedder
//! ```

pub mod agent;
pub mod catalog;
pub mod completion;
pub mod composer;
pub mod embedding;
pub mod index;
pub mod memory;
pub mod models;
pub mod search;
