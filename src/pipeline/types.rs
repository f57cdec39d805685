//! Core types for the acquisition and analysis pipeline.
//!
//! These types model the full document lifecycle:
//! Discovery → Duplicate check → Fetch → Verification → Segmentation →
//! {Structural metadata, LLM analysis} → Merge → Record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════
// Discovery
// ═══════════════════════════════════════════

/// How a candidate document was discovered on the results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Matched a row in the scored results table.
    Table,
    /// Matched a hyperlink during the link-scan fallback.
    LinkScan,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::LinkScan => "link_scan",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "table" => Some(Self::Table),
            "link_scan" => Some(Self::LinkScan),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate opinion discovered on the court's results listing.
///
/// Ephemeral: created by `SourceDiscovery`, consumed downstream, never
/// persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReference {
    /// Canonical identifier, e.g. "T-100-25".
    pub identifier: String,
    /// Download URL for the binary document.
    pub canonical_url: String,
    /// HTML view of the opinion on the court's site.
    pub html_url: String,
    /// Raw title or row snippet as seen on the page.
    pub title: String,
    /// URL of the page the candidate was found on.
    pub source_page: String,
    pub discovery_method: DiscoveryMethod,
    /// Publication date matched against the target window.
    pub publication_date: Option<NaiveDate>,
}

// ═══════════════════════════════════════════
// Fetch
// ═══════════════════════════════════════════

/// A downloaded and verified document payload.
/// Exclusively owned between the fetcher and the text extractor.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// URL the bytes were actually served from (may be an alternate).
    pub source_url: String,
}

/// Byte-signature classification of a fetched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSignature {
    /// "PK": zip container, in practice OOXML despite the ".rtf" name.
    DocxZip,
    /// "{\rtf": genuine RTF.
    Rtf,
    Unknown,
}

impl DocumentSignature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocxZip => "docx_zip",
            Self::Rtf => "rtf",
            Self::Unknown => "unknown",
        }
    }

    /// Preferred file extension when caching to disk.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::DocxZip => ".docx",
            Self::Rtf => ".rtf",
            Self::Unknown => ".rtf",
        }
    }
}

// ═══════════════════════════════════════════
// Segmentation
// ═══════════════════════════════════════════

/// The opinion text split into its canonical sections.
///
/// Invariant: when a resolution trigger is detected, `resolution` holds
/// *all* subsequent paragraphs, never a length-capped prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentedText {
    pub full_text: String,
    /// First non-empty lines of the document; reliable source of case
    /// number, rapporteur and document number.
    pub header: String,
    pub considerations: String,
    pub resolution: String,
    /// Paragraphs between the header capture and the considerations heading.
    pub other: Vec<String>,
}

// ═══════════════════════════════════════════
// Structural metadata
// ═══════════════════════════════════════════

/// Deterministic bibliographic fields extracted by pattern matching.
///
/// Every field is independently nullable and only set when it passed its
/// field-specific validator, never a raw unvalidated match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralMetadata {
    pub numero_sentencia: Option<String>,
    pub magistrado_ponente: Option<String>,
    pub sala_revision: Option<String>,
    pub expediente: Option<String>,
}

impl StructuralMetadata {
    /// Number of fields that passed validation.
    pub fn field_count(&self) -> usize {
        [
            self.numero_sentencia.is_some(),
            self.magistrado_ponente.is_some(),
            self.sala_revision.is_some(),
            self.expediente.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

// ═══════════════════════════════════════════
// Analysis
// ═══════════════════════════════════════════

/// Final merged analysis for one opinion.
///
/// Narrative fields come from the LLM provider; structural fields prefer
/// the regex extraction, falling back to the provider's own guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseAnalysis {
    pub tema_principal: String,
    pub resumen_ia: String,
    pub decision: String,
    pub numero_sentencia: Option<String>,
    pub magistrado_ponente: Option<String>,
    pub sala_revision: Option<String>,
    pub expediente: Option<String>,
    /// Provenance: which provider (or "deterministic-only") produced the
    /// narrative fields.
    pub modelo_usado: String,
    pub confidencia: f32,
    pub fragmentos_analizados: u32,
}

// ═══════════════════════════════════════════
// Output record
// ═══════════════════════════════════════════

/// Verification details recorded alongside the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInfo {
    pub source_url: String,
    pub content_type: Option<String>,
    pub size_bytes: usize,
    pub signature: DocumentSignature,
}

/// The record handed to the persistence collaborator.
/// Field names follow the storage contract, hence camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub document_id: String,
    pub title: String,
    pub url: String,
    pub content: String,
    pub full_text_content: String,
    pub summary: String,
    pub document_type: String,
    pub legal_area: String,
    pub publication_date: Option<NaiveDate>,
    pub extraction_date: String,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub structured_data: CaseAnalysis,
    pub verification: VerificationInfo,
    pub extracted_metadata: StructuralMetadata,
}

// ═══════════════════════════════════════════
// Run summary
// ═══════════════════════════════════════════

/// User-visible result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub found: u32,
    pub processed: u32,
    pub duplicates: u32,
    pub failed: u32,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            found: 0,
            processed: 0,
            duplicates: 0,
            failed: 0,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }
}
