//! Legal document acquisition pipeline.
//!
//! Stages, in execution order:
//! window → page → discovery → duplicate → fetch → docx → segment →
//! {metadata, analysis} → runner.
//!
//! Each stage is independently testable; the runner wires them together
//! and owns the resilience policy (abort on navigation failure, continue
//! on per-candidate failure).

use thiserror::Error;

pub mod analysis;
pub mod discovery;
pub mod docx;
pub mod duplicate;
pub mod fetch;
pub mod identifier;
pub mod metadata;
pub mod page;
pub mod runner;
pub mod segment;
pub mod types;
pub mod window;

pub use runner::Pipeline;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not render page: {0}")]
    Navigation(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document not found at any candidate URL: {0}")]
    NotFound(String),

    #[error("Downloaded payload rejected: {0}")]
    VerificationRejected(String),

    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] analysis::AnalysisError),
}
