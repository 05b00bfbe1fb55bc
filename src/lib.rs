//! Multimodal (text, image, audio) product search.
//!
//! The query side ([`router::QueryRouter`]) turns exactly one of an audio clip,
//! a text or an image into a call to the search tool service ([`tools`]) over
//! MCP, then maps the answer into a captioned gallery with per-stage latency.
//! The tool service answers from a vector database collection ([`db`]).

pub mod client;
pub mod codec;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod gallery;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod query;
pub mod router;
pub mod tools;
pub mod transcribe;

pub use error::{QueryError, SearchError};
pub use router::{QueryRouter, SearchOutcome};
