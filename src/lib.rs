//! # fretwise
//!
//! A conversational guitar advisor. Free-text chat or structured
//! preferences go in; ranked product suggestions with a short rationale
//! come out.
//!
//! The retrieval and ranking pipeline lives in `fretwise-core`. This crate
//! adds configuration, the network-backed embedding and completion
//! providers, the [`service::Advisor`] service object, the HTTP server and
//! the CLI commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │ HTTP/CLI │──▶│ Advisor  │──▶│ Agent        │──▶│ ProductIndex │
//! └──────────┘   └────┬─────┘   │ (classifier, │   │ (catalog)    │
//!                     │         │  memory)     │   └──────▲───────┘
//!                     ▼         └──────┬───────┘          │
//!                ┌──────────┐          │                  │
//!                │ Composer │◀─────────┘──────────────────┘
//!                └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | OpenAI, hashing and local embedding providers |
//! | [`completion`] | OpenAI chat completions and the disabled provider |
//! | [`service`] | Catalog loading and the [`service::Advisor`] |
//! | [`server`] | HTTP server (`/recommend`, `/chat`, `/health`) |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod server;
pub mod service;
