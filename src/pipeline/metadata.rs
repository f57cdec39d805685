//! Deterministic structural metadata extraction.
//!
//! Four bibliographic fields are pulled from the opinion by pattern
//! matching, each behind a field-specific validator so that a plausible
//! looking but malformed match is dropped rather than recorded. The scan
//! runs on a worker thread and the caller collects results under a
//! deadline: a pathological document costs at most the configured
//! timeout and yields whatever fields were found in time.

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;

use super::identifier;
use super::types::{SegmentedText, StructuralMetadata};

/// Earliest plausible year for a sentence number found in the header.
const MIN_HEADER_YEAR: i32 = 2020;
/// Body matches are noisier (citations of older cases), so the bar is higher.
const MIN_BODY_YEAR: i32 = 2023;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Numero,
    Magistrado,
    Sala,
    Expediente,
}

pub struct MetadataExtractor {
    timeout: Duration,
}

impl MetadataExtractor {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Run all field scans, bounded by the configured deadline. Returns
    /// whatever validated in time; a timeout is partial, never an error.
    pub fn extract(&self, segmented: &SegmentedText) -> StructuralMetadata {
        let (tx, rx) = mpsc::channel::<(Field, String)>();
        let header = segmented.header.clone();
        let body = segmented.full_text.clone();

        thread::spawn(move || {
            scan_fields(&header, &body, &tx);
        });

        let metadata = collect_with_deadline(&rx, self.timeout);
        tracing::debug!(fields = metadata.field_count(), "Structural metadata extracted");
        metadata
    }
}

/// Worker side: run each field scan in turn, streaming hits as they land.
fn scan_fields(header: &str, body: &str, tx: &mpsc::Sender<(Field, String)>) {
    if let Some(numero) = extract_numero(header, body) {
        let _ = tx.send((Field::Numero, numero));
    }
    if let Some(magistrado) = extract_magistrado(header, body) {
        let _ = tx.send((Field::Magistrado, magistrado));
    }
    if let Some(sala) = extract_sala(header, body) {
        let _ = tx.send((Field::Sala, sala));
    }
    if let Some(expediente) = extract_expediente(header, body) {
        let _ = tx.send((Field::Expediente, expediente));
    }
}

/// Collector side: drain field hits until the worker finishes or the
/// deadline passes, whichever is first.
fn collect_with_deadline(
    rx: &mpsc::Receiver<(Field, String)>,
    timeout: Duration,
) -> StructuralMetadata {
    let deadline = Instant::now() + timeout;
    let mut metadata = StructuralMetadata::default();

    loop {
        let remaining = match deadline.checked_duration_since(Instant::now()) {
            Some(d) if !d.is_zero() => d,
            _ => {
                tracing::warn!("Metadata extraction deadline reached, returning partial result");
                break;
            }
        };

        match rx.recv_timeout(remaining) {
            Ok((field, value)) => match field {
                Field::Numero => metadata.numero_sentencia = Some(value),
                Field::Magistrado => metadata.magistrado_ponente = Some(value),
                Field::Sala => metadata.sala_revision = Some(value),
                Field::Expediente => metadata.expediente = Some(value),
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!("Metadata extraction deadline reached, returning partial result");
                break;
            }
        }
    }

    metadata
}

// ═══════════════════════════════════════════════════════════
// Field scans
// ═══════════════════════════════════════════════════════════

/// Sentence number: the header is authoritative; the body is consulted
/// only when the header has nothing, and with a stricter year floor,
/// since opinion bodies are dense with citations of older cases.
fn extract_numero(header: &str, body: &str) -> Option<String> {
    if let Some(canonical) = first_id_with_year_floor(header, MIN_HEADER_YEAR) {
        return Some(canonical);
    }
    first_id_with_year_floor(body, MIN_BODY_YEAR)
}

fn first_id_with_year_floor(text: &str, floor: i32) -> Option<String> {
    for line in text.lines() {
        if let Some(canonical) = identifier::find_in_text(line) {
            if id_year(&canonical).is_some_and(|y| y >= floor) {
                return Some(canonical);
            }
        }
    }
    None
}

fn id_year(canonical: &str) -> Option<i32> {
    let suffix = canonical.rsplit('-').next()?;
    let year: i32 = suffix.parse().ok()?;
    // Two-digit years pivot at 50: "92" is 1992, "25" is 2025.
    Some(match year {
        0..=49 => 2000 + year,
        50..=99 => 1900 + year,
        _ => year,
    })
}

fn magistrado_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:magistrad[oa]s?\s+ponentes?|m\.\s*p\.|ponente)\s*[:.]?\s*([A-ZÁÉÍÓÚÑ][A-Za-zÁÉÍÓÚÑáéíóúñ .]{3,80})",
        )
        .expect("magistrado regex")
    })
}

/// Rapporteur: label-anchored capture, validated as a personal name.
fn extract_magistrado(header: &str, body: &str) -> Option<String> {
    for text in [header, body] {
        for caps in magistrado_regex().captures_iter(text) {
            let candidate = caps[1].trim().trim_end_matches('.').trim();
            if is_valid_name(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// 2–5 capitalized tokens, 10–60 chars, no digits.
fn is_valid_name(candidate: &str) -> bool {
    let len = candidate.chars().count();
    if !(10..=60).contains(&len) || candidate.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    let tokens: Vec<&str> = candidate.split_whitespace().collect();
    if !(2..=5).contains(&tokens.len()) {
        return false;
    }

    tokens
        .iter()
        .all(|t| t.chars().next().is_some_and(char::is_uppercase))
}

fn sala_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bsala\s+(plena|primera|segunda|tercera|cuarta|quinta|sexta|s[eé]ptima|octava|novena)(\s+de\s+revisi[oó]n)?",
        )
        .expect("sala regex")
    })
}

/// Chamber: closed vocabulary, normalized casing.
fn extract_sala(header: &str, body: &str) -> Option<String> {
    for text in [header, body] {
        if let Some(caps) = sala_regex().captures(text) {
            let name = capitalize(&caps[1]);
            let mut sala = format!("Sala {name}");
            if caps.get(2).is_some() {
                sala.push_str(" de Revisión");
            }
            return Some(sala);
        }
    }
    None
}

fn expediente_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)expedientes?\s*(?:no\.?|n[uú]m\.?)?\s*[:.]?\s*([A-Z]{1,4}-[\d.,]+)")
            .expect("expediente regex")
    })
}

/// Docket number: label-anchored, shape-validated.
fn extract_expediente(header: &str, body: &str) -> Option<String> {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    let shape = SHAPE.get_or_init(|| {
        Regex::new(r"^[A-Z]{1,4}-\d[\d.,]*\d$|^[A-Z]{1,4}-\d$").expect("expediente shape")
    });

    for text in [header, body] {
        for caps in expediente_regex().captures_iter(text) {
            let candidate = caps[1].trim_end_matches(['.', ',']).to_uppercase();
            let len = candidate.chars().count();
            if (4..=20).contains(&len) && shape.is_match(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => lower,
    }
}
