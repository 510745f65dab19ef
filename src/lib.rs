//! # Review Analyzer
//!
//! Learns a person's idiosyncratic movie-review writing style from their
//! watched films and written reviews, then generates reviews for unseen
//! movies that imitate that style, drawing on semantically similar
//! previously-watched films.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Review corpus │──▶│ StyleLearner │──▶│ StyleProfile │
//! │ + catalog     │   │ batch+retry  │   └──────┬──────┘
//! └──────────────┘   └──────┬───────┘          │
//!                           ▼                  ▼
//!                    ┌─────────────┐   ┌────────────────┐
//!                    │ VectorIndex │◀──│ ReviewGenerator │──▶ GeneratedReview
//!                    │ SQLite+cos  │   │ retrieve+score │
//!                    └─────────────┘   └────────────────┘
//! ```
//!
//! The embedding and generation models are external collaborators, injected
//! as [`embedding::EmbeddingClient`] and [`llm::CompletionClient`] trait
//! objects so tests substitute fakes.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and bucketing |
//! | [`parse`] | Structured-output parsers |
//! | [`llm`] | Completion capability |
//! | [`embedding`] | Embedding capability + vector utilities |
//! | [`index`] | Persistent cosine vector index |
//! | [`analysis`] | Sentiment / references / pattern mining |
//! | [`retry`] | Bounded retry policy |
//! | [`learner`] | Batch ingestion + profile assembly |
//! | [`generator`] | Retrieval-augmented generation + scoring |

pub mod analysis;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod learner;
pub mod llm;
pub mod models;
pub mod parse;
pub mod retry;

pub use error::{Error, Result};
