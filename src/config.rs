//! Pipeline configuration: source URLs, timeouts, delays, and search limits.
//!
//! All tuned constants live here so the pipeline stages stay free of
//! hardcoded values. URL construction is centralized too, since the
//! court's path layout is the one thing every stage agrees on.

use std::path::PathBuf;

use serde::Serialize;

use crate::pipeline::identifier;

// ═══════════════════════════════════════════════════════════
// Config
// ═══════════════════════════════════════════════════════════

/// Configuration for a full acquisition run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractorConfig {
    /// Court site root.
    pub base_url: String,
    /// User agent sent on document downloads.
    pub user_agent: String,
    /// Per-request HTTP timeout.
    pub http_timeout_secs: u64,
    /// Payloads below this size are rejected as error stubs.
    pub min_document_bytes: usize,
    /// Business days to search in a normal run.
    pub normal_search_days: usize,
    /// Business days to search when the store is empty (first run).
    pub extended_search_days: usize,
    /// Calendar days the window resolver may scan backward.
    pub max_lookback_days: usize,
    /// Rows examined per results table before giving up.
    pub max_rows_per_table: usize,
    /// Non-empty lines captured as the document header.
    pub header_lines: usize,
    /// Below this, the considerations section is replaced by a generic slice.
    pub min_considerations_chars: usize,
    /// Bound on the whole structural-metadata extraction call.
    pub metadata_timeout_ms: u64,
    /// Fixed delay between analysis requests drained from the queue.
    pub queue_delay_ms: u64,
    /// Local cache of downloaded documents, also consulted by the
    /// duplicate guard.
    pub cache_dir: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relatoria")
            .join("documents");

        Self {
            base_url: "https://www.corteconstitucional.gov.co".to_string(),
            user_agent: "relatoria/0.1 (jurisprudence acquisition)".to_string(),
            http_timeout_secs: 30,
            min_document_bytes: 100,
            normal_search_days: 2,
            extended_search_days: 8,
            max_lookback_days: 30,
            max_rows_per_table: 50,
            header_lines: 25,
            min_considerations_chars: 500,
            metadata_timeout_ms: 2_000,
            queue_delay_ms: 1_000,
            cache_dir,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// URL construction
// ═══════════════════════════════════════════════════════════

impl ExtractorConfig {
    /// The rendered jurisprudence search page.
    pub fn search_url(&self) -> String {
        format!("{}/relatoria/buscador-jurisprudencia", self.base_url)
    }

    /// Primary download URL for a canonical identifier.
    pub fn document_url(&self, canonical_id: &str, year: i32) -> String {
        let slug = identifier::url_slug(canonical_id);
        format!("{}/sentencias/{year}/{slug}.rtf", self.base_url)
    }

    /// HTML view of the opinion.
    pub fn html_url(&self, canonical_id: &str, year: i32) -> String {
        format!("{}/relatoria/{year}/{canonical_id}.htm", self.base_url)
    }

    /// Primary URL plus the fixed, deterministic list of alternates tried
    /// on failure: older year first, then the relatoria path segments.
    pub fn candidate_urls(&self, canonical_id: &str, year: i32) -> Vec<String> {
        let slug = identifier::url_slug(canonical_id);
        vec![
            format!("{}/sentencias/{year}/{slug}.rtf", self.base_url),
            format!("{}/sentencias/{}/{slug}.rtf", self.base_url, year - 1),
            format!("{}/relatoria/{year}/{slug}.rtf", self.base_url),
            format!("{}/relatoria/{}/{slug}.rtf", self.base_url, year - 1),
        ]
    }
}
