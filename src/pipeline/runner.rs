//! End-to-end acquisition runs.
//!
//! One run: resolve the target window, render the search page, discover
//! candidates, then walk each candidate through guard → fetch → extract
//! → segment → metadata → analysis → record. Navigation failure aborts
//! the run; every per-candidate failure is recorded in the summary and
//! the walk continues.

use std::time::Instant;

use chrono::NaiveDate;

use crate::config::ExtractorConfig;

use super::analysis::orchestrator::{deterministic_only, AnalysisOrchestrator};
use super::discovery::SourceDiscovery;
use super::docx::extract_docx_text;
use super::duplicate::{DocumentStore, DuplicateGuard};
use super::fetch::{self, DocumentFetcher, FetchOutcome};
use super::identifier;
use super::metadata::MetadataExtractor;
use super::page::PageDriver;
use super::segment::segment;
use super::types::{
    DocumentRecord, DocumentReference, FetchedDocument, RecordMetadata, RunSummary,
    VerificationInfo,
};
use super::window::resolve_window;
use super::PipelineError;

/// Below this many stored documents the run is considered a backfill and
/// searches the extended window.
const BACKFILL_THRESHOLD: usize = 5;

pub struct Pipeline<'a> {
    config: &'a ExtractorConfig,
    driver: &'a dyn PageDriver,
    store: &'a dyn DocumentStore,
    fetcher: DocumentFetcher,
    metadata: MetadataExtractor,
    analysis: Option<&'a AnalysisOrchestrator>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a ExtractorConfig,
        driver: &'a dyn PageDriver,
        store: &'a dyn DocumentStore,
        analysis: Option<&'a AnalysisOrchestrator>,
    ) -> Self {
        Self {
            config,
            driver,
            store,
            fetcher: DocumentFetcher::new(config),
            metadata: MetadataExtractor::new(config.metadata_timeout_ms),
            analysis,
        }
    }

    /// Run one acquisition pass for the window ending at `reference`.
    pub fn run(
        &self,
        reference: NaiveDate,
        limit: usize,
        force_extended: bool,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let mut summary = RunSummary::new(uuid::Uuid::new_v4().to_string());

        let days = if force_extended || self.is_backfill() {
            self.config.extended_search_days
        } else {
            self.config.normal_search_days
        };
        let window = resolve_window(reference, days, self.config.max_lookback_days);
        tracing::info!(
            run_id = %summary.run_id,
            days = window.len(),
            "Acquisition run started"
        );

        // A dead search page means nothing downstream can work.
        let page = self.driver.navigate(&self.config.search_url())?;

        let discovery = SourceDiscovery::new(self.config);
        let candidates = discovery.discover(&page, &window, limit);
        summary.found = candidates.len() as u32;

        let guard = DuplicateGuard::new(self.store, self.config.cache_dir.clone());

        for candidate in &candidates {
            if guard.is_duplicate(candidate) {
                summary.duplicates += 1;
                continue;
            }

            match self.process_candidate(candidate) {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    tracing::warn!(id = %candidate.identifier, error = %e, "Candidate failed");
                    summary.failed += 1;
                    summary.errors.push(format!("{}: {e}", candidate.identifier));
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %summary.run_id,
            found = summary.found,
            processed = summary.processed,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "Acquisition run finished"
        );

        Ok(summary)
    }

    /// Fetch, extract, analyze and store one candidate.
    fn process_candidate(&self, reference: &DocumentReference) -> Result<(), PipelineError> {
        let document = match self.fetcher.fetch(self.config, reference)? {
            FetchOutcome::Fetched(doc) => doc,
            FetchOutcome::NotFound => {
                return Err(PipelineError::NotFound(reference.identifier.clone()));
            }
            FetchOutcome::Rejected { reason } => {
                return Err(PipelineError::VerificationRejected(reason));
            }
        };

        fetch::download_to(&self.config.cache_dir, &reference.identifier, &document)?;

        let record = self.build_record(reference, &document)?;
        self.store
            .save(record)
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        Ok(())
    }

    fn build_record(
        &self,
        reference: &DocumentReference,
        document: &FetchedDocument,
    ) -> Result<DocumentRecord, PipelineError> {
        let full_text = extract_docx_text(&document.bytes)?;
        let segmented = segment(&full_text, self.config);
        let structural = self.metadata.extract(&segmented);

        // A failed analysis degrades to the deterministic fields rather
        // than losing the document.
        let analysis = match self.analysis {
            Some(orchestrator) => match orchestrator.analyze(&segmented, &structural) {
                Ok(analysis) => analysis,
                Err(e) => {
                    tracing::warn!(id = %reference.identifier, error = %e, "Analysis failed, keeping deterministic fields");
                    deterministic_only(&structural)
                }
            },
            None => deterministic_only(&structural),
        };

        let verification = VerificationInfo {
            source_url: document.source_url.clone(),
            content_type: document.content_type.clone(),
            size_bytes: document.bytes.len(),
            signature: fetch::sniff_signature(&document.bytes),
        };

        Ok(DocumentRecord {
            document_id: reference.identifier.clone(),
            title: reference.title.clone(),
            url: document.source_url.clone(),
            content: segmented.header.clone(),
            full_text_content: segmented.full_text.clone(),
            summary: analysis.resumen_ia.clone(),
            document_type: identifier::document_kind(&reference.identifier).to_string(),
            legal_area: "derecho constitucional".to_string(),
            publication_date: reference.publication_date,
            extraction_date: chrono::Utc::now().to_rfc3339(),
            metadata: RecordMetadata {
                structured_data: analysis,
                verification,
                extracted_metadata: structural,
            },
        })
    }

    fn is_backfill(&self) -> bool {
        match self.store.count() {
            Ok(count) => count < BACKFILL_THRESHOLD,
            // Unknown store state: search wide rather than miss documents.
            Err(e) => {
                tracing::warn!(error = %e, "Store count unavailable, assuming backfill");
                true
            }
        }
    }
}
