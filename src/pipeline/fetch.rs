//! Document download and verification.
//!
//! The court serves error pages with a 200 status and the requested
//! ".rtf" name, so every payload is verified before it counts as a
//! document: HTML disguise check first (sniffed bytes override the
//! declared content type), then a minimum-size check, then byte-signature
//! classification. Alternate URLs are tried in the configured order and
//! only a payload that survives verification stops the walk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ExtractorConfig;

use super::identifier;
use super::types::{DocumentReference, DocumentSignature, FetchedDocument};
use super::PipelineError;

/// How many leading bytes are inspected for the HTML disguise check.
const SNIFF_WINDOW: usize = 512;

/// Outcome of one download attempt across all candidate URLs.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(FetchedDocument),
    /// Every candidate URL returned 404.
    NotFound,
    /// A payload arrived but failed verification.
    Rejected { reason: String },
}

pub struct DocumentFetcher {
    client: reqwest::blocking::Client,
    min_document_bytes: usize,
}

impl DocumentFetcher {
    pub fn new(config: &ExtractorConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            min_document_bytes: config.min_document_bytes,
        }
    }

    /// Try the candidate's primary URL, then the fixed alternates, until
    /// one yields a verified payload.
    pub fn fetch(
        &self,
        config: &ExtractorConfig,
        reference: &DocumentReference,
    ) -> Result<FetchOutcome, PipelineError> {
        let year = reference
            .publication_date
            .map(|d| chrono::Datelike::year(&d))
            .unwrap_or_else(|| chrono::Datelike::year(&chrono::Local::now().date_naive()));

        let mut last_rejection: Option<String> = None;
        let mut last_transport: Option<PipelineError> = None;

        for url in config.candidate_urls(&reference.identifier, year) {
            match self.fetch_url(&url) {
                Ok(FetchOutcome::Fetched(doc)) => {
                    tracing::info!(id = %reference.identifier, url = %url, bytes = doc.bytes.len(), "Document fetched");
                    return Ok(FetchOutcome::Fetched(doc));
                }
                Ok(FetchOutcome::NotFound) => {
                    tracing::debug!(url = %url, "Not found, trying alternate");
                }
                Ok(FetchOutcome::Rejected { reason }) => {
                    tracing::warn!(url = %url, reason = %reason, "Payload rejected, trying alternate");
                    last_rejection = Some(reason);
                }
                // A flaky URL must not end the walk; an alternate may serve.
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Transport error, trying alternate");
                    last_transport = Some(e);
                }
            }
        }

        match (last_rejection, last_transport) {
            (Some(reason), _) => Ok(FetchOutcome::Rejected { reason }),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(FetchOutcome::NotFound),
        }
    }

    /// Download and verify a single URL.
    pub fn fetch_url(&self, url: &str) -> Result<FetchOutcome, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(PipelineError::Http)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Ok(FetchOutcome::Rejected {
                reason: format!("status {}", status.as_u16()),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response.bytes().map_err(PipelineError::Http)?.to_vec();

        Ok(verify_payload(bytes, content_type, url, self.min_document_bytes))
    }
}

/// Apply the verification rules to a downloaded payload.
fn verify_payload(
    bytes: Vec<u8>,
    content_type: Option<String>,
    url: &str,
    min_bytes: usize,
) -> FetchOutcome {
    if looks_like_html(&bytes, content_type.as_deref()) {
        return FetchOutcome::Rejected {
            reason: "HTML page served in place of document".to_string(),
        };
    }

    if bytes.len() < min_bytes {
        return FetchOutcome::Rejected {
            reason: format!("payload too small: {} bytes", bytes.len()),
        };
    }

    FetchOutcome::Fetched(FetchedDocument {
        bytes,
        content_type,
        source_url: url.to_string(),
    })
}

/// HTML disguise check. The sniffed bytes decide; the declared content
/// type alone is enough only when the body is inconclusive.
fn looks_like_html(bytes: &[u8], content_type: Option<&str>) -> bool {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    let head = String::from_utf8_lossy(window).to_lowercase();
    if head.contains("<!doctype html") || head.contains("<html") {
        return true;
    }

    // A declared HTML type with a non-HTML body still means an error page.
    content_type.is_some_and(|ct| ct.to_lowercase().contains("text/html"))
}

/// Classify a payload by its leading bytes.
pub fn sniff_signature(bytes: &[u8]) -> DocumentSignature {
    if bytes.starts_with(b"PK") {
        DocumentSignature::DocxZip
    } else if bytes.starts_with(b"{\\rtf") {
        DocumentSignature::Rtf
    } else {
        DocumentSignature::Unknown
    }
}

/// Write the payload to the cache directory under the identifier's slug,
/// with the extension corrected to match the sniffed signature.
pub fn download_to(
    dir: &Path,
    canonical_id: &str,
    document: &FetchedDocument,
) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir).map_err(PipelineError::Io)?;

    let signature = sniff_signature(&document.bytes);
    let slug = identifier::url_slug(canonical_id);
    let path = dir.join(format!("{slug}{}", signature.extension()));

    fs::write(&path, &document.bytes).map_err(PipelineError::Io)?;
    tracing::info!(path = %path.display(), signature = signature.as_str(), "Document cached");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docx_bytes() -> Vec<u8> {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.resize(4_096, 0);
        bytes
    }

    #[test]
    fn html_disguise_rejected_despite_binary_content_type() {
        let body = b"<!DOCTYPE html><html><body>Error 404</body></html>".to_vec();
        let outcome = verify_payload(
            body,
            Some("application/octet-stream".to_string()),
            "u",
            100,
        );
        assert!(matches!(outcome, FetchOutcome::Rejected { ref reason } if reason.contains("HTML")));
    }

    #[test]
    fn html_content_type_rejected_even_with_opaque_body() {
        let outcome = verify_payload(
            vec![0u8; 4_096],
            Some("text/html; charset=utf-8".to_string()),
            "u",
            100,
        );
        assert!(matches!(outcome, FetchOutcome::Rejected { .. }));
    }

    #[test]
    fn undersized_payload_rejected() {
        let outcome = verify_payload(b"PK\x03\x04tiny".to_vec(), None, "u", 100);
        assert!(matches!(outcome, FetchOutcome::Rejected { ref reason } if reason.contains("small")));
    }

    #[test]
    fn valid_payload_accepted() {
        let outcome = verify_payload(docx_bytes(), Some("application/msword".to_string()), "u", 100);
        match outcome {
            FetchOutcome::Fetched(doc) => {
                assert_eq!(doc.source_url, "u");
                assert_eq!(doc.bytes.len(), 4_096);
            }
            other => panic!("expected Fetched, got {other:?}"),
        }
    }

    #[test]
    fn signature_sniffing() {
        assert_eq!(sniff_signature(b"PK\x03\x04..."), DocumentSignature::DocxZip);
        assert_eq!(sniff_signature(b"{\\rtf1\\ansi"), DocumentSignature::Rtf);
        assert_eq!(sniff_signature(b"plain text"), DocumentSignature::Unknown);
        assert_eq!(sniff_signature(b""), DocumentSignature::Unknown);
    }

    #[test]
    fn case_insensitive_html_sniff() {
        let body = b"  <HTML><HEAD>".to_vec();
        let outcome = verify_payload(body, None, "u", 1);
        assert!(matches!(outcome, FetchOutcome::Rejected { .. }));
    }

    #[test]
    fn transport_error_on_one_candidate_does_not_end_the_walk() {
        use std::io::{Read as _, Write as _};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        std::thread::spawn(move || {
            for (i, stream) in listener.incoming().enumerate() {
                let Ok(mut stream) = stream else { break };
                if i == 0 {
                    // Close without answering: a transport error client-side.
                    drop(stream);
                    continue;
                }
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let mut body = b"PK\x03\x04".to_vec();
                body.resize(4_096, 0);
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
            }
        });

        let config = ExtractorConfig {
            base_url: format!("http://127.0.0.1:{port}"),
            http_timeout_secs: 5,
            ..ExtractorConfig::default()
        };
        let reference = DocumentReference {
            identifier: "T-100-25".to_string(),
            canonical_url: config.document_url("T-100-25", 2025),
            html_url: config.html_url("T-100-25", 2025),
            title: "Sentencia T-100-25".to_string(),
            source_page: config.search_url(),
            discovery_method: crate::pipeline::types::DiscoveryMethod::Table,
            publication_date: chrono::NaiveDate::from_ymd_opt(2025, 9, 4),
        };

        let fetcher = DocumentFetcher::new(&config);
        let outcome = fetcher.fetch(&config, &reference).unwrap();

        // First candidate URL dies mid-connection; the second serves.
        match outcome {
            FetchOutcome::Fetched(doc) => {
                assert_eq!(doc.bytes.len(), 4_096);
                assert!(doc.bytes.starts_with(b"PK"));
            }
            other => panic!("expected Fetched, got {other:?}"),
        }
    }

    #[test]
    fn all_candidates_failing_transport_is_an_error() {
        // Nothing listens on this port; every candidate fails the same way.
        let config = ExtractorConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            http_timeout_secs: 2,
            ..ExtractorConfig::default()
        };
        let reference = DocumentReference {
            identifier: "T-100-25".to_string(),
            canonical_url: config.document_url("T-100-25", 2025),
            html_url: config.html_url("T-100-25", 2025),
            title: "Sentencia T-100-25".to_string(),
            source_page: config.search_url(),
            discovery_method: crate::pipeline::types::DiscoveryMethod::Table,
            publication_date: chrono::NaiveDate::from_ymd_opt(2025, 9, 4),
        };

        let fetcher = DocumentFetcher::new(&config);
        let err = fetcher.fetch(&config, &reference).unwrap_err();
        assert!(matches!(err, PipelineError::Http(_)));
    }

    #[test]
    fn download_corrects_extension_to_signature() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = FetchedDocument {
            bytes: docx_bytes(),
            content_type: None,
            source_url: "https://example.test/sentencias/2025/t-100-25.rtf".to_string(),
        };

        let path = download_to(tmp.path(), "T-100-25", &doc).unwrap();
        assert!(path.ends_with("t-100-25.docx"), "got {}", path.display());
        assert_eq!(std::fs::read(&path).unwrap(), doc.bytes);
    }

    #[test]
    fn download_su_family_uses_quirk_slug() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = FetchedDocument {
            bytes: b"{\\rtf1 contenido del documento con suficiente texto para pasar la verificacion de tamano minimo de cien bytes en total aqui".to_vec(),
            content_type: None,
            source_url: "u".to_string(),
        };

        let path = download_to(tmp.path(), "SU-315-25", &doc).unwrap();
        assert!(path.ends_with("su315-25.rtf"), "got {}", path.display());
    }
}
