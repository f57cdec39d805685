//! Acquisition and structured analysis of Colombian
//! Constitutional Court opinions.
//!
//! The crate discovers recently published sentencias on the court's
//! search page, downloads and verifies the underlying documents,
//! extracts and segments their text, pulls structural metadata by
//! pattern matching, and optionally enriches each record with an
//! LLM-generated analysis. See `pipeline::Pipeline` for the entry point.

pub mod config;
pub mod pipeline;

pub use config::ExtractorConfig;
pub use pipeline::{Pipeline, PipelineError};
