//! Weaver backend: a multi-tenant retrieval-augmented generation pipeline
//! over issue-tracker and chat-transcript records.
//!
//! Raw records flow through normalization and token-bounded chunking into a
//! per-tenant SQLite vector store; queries embed, retrieve top-k chunks, and
//! synthesize an answer — or degrade to an extractive one when the answer
//! provider is down. An axum server exposes the pipeline per tenant.

pub mod core;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod state;
pub mod store;
pub mod tenant;
