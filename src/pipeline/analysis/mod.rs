//! LLM-backed case analysis.
//!
//! Narrative fields (topic, summary, decision) come from a hosted chat
//! model; structural fields stay deterministic and only fall back to the
//! model's guess when the regex extraction found nothing. All provider
//! traffic is serialized through a rate-limited FIFO queue.

use thiserror::Error;

pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod queue;

pub use orchestrator::AnalysisOrchestrator;
pub use prompt::AnalysisPrompt;
pub use provider::{providers_from_env, AnalysisProvider, GeminiProvider, OpenAiProvider};
pub use queue::AnalysisQueue;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Cannot reach provider: {0}")]
    Connection(String),

    #[error("Provider request timed out: {0}")]
    Timeout(String),

    #[error("Provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Provider response was not the expected JSON: {0}")]
    MalformedResponse(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("No analysis provider configured")]
    NoProviderConfigured,

    #[error("Analysis queue is shut down")]
    QueueClosed,
}
