// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod popularity;
pub mod quota;
pub mod relevance;
pub mod sentiment;
pub mod synth;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::{AppConfig, QueryContext};
pub use crate::error::{DigestError, Fault};
pub use crate::ingest::types::{Article, SourceAdapter};
pub use crate::pipeline::{Digest, DigestPipeline};
