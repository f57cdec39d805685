//! Sentence identifier normalization.
//!
//! The source is inconsistent about separators ("T-373/25", "su.315-25",
//! "SU 315 25" all occur), so everything is reduced to one canonical form
//! before URLs, filenames, or duplicate checks are derived from it.
//!
//! One documented source quirk: the canonical download URL for the "SU"
//! family omits the dash immediately after the prefix ("su315-25", not
//! "su-315-25"), while every other family keeps it ("t-373-25").

use std::sync::OnceLock;

use regex::Regex;

/// Matches a sentence id anywhere in text: prefix, number, two- or
/// four-digit year, with any mix of separators.
fn sentence_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(SU|[TCA])[\s./-]*(\d{1,4})[\s./-]+(\d{2,4})\b")
            .expect("sentence id regex")
    })
}

/// Normalize a raw identifier to canonical form: uppercase, single dashes.
///
/// "su.315-25" → "SU-315-25"; "T-373/25" → "T-373-25". Idempotent.
/// Returns `None` when no sentence id is present.
pub fn normalize(raw: &str) -> Option<String> {
    for caps in sentence_id_regex().captures_iter(raw) {
        let prefix_match = caps.get(1).expect("group 1");
        let number_match = caps.get(2).expect("group 2");
        let sep = &raw[prefix_match.end()..number_match.start()];

        // A lowercase single-letter prefix joined only by spaces is almost
        // always prose ("a 04/09/2025"), not an identifier.
        let prefix_raw = prefix_match.as_str();
        if prefix_raw.len() == 1
            && prefix_raw.chars().all(char::is_lowercase)
            && !sep.is_empty()
            && sep.chars().all(char::is_whitespace)
        {
            continue;
        }

        return Some(format!(
            "{}-{}-{}",
            prefix_raw.to_uppercase(),
            number_match.as_str(),
            &caps[3]
        ));
    }
    None
}

/// Lowercase URL slug for the download path.
///
/// The SU family drops the dash after the prefix: "SU-315-25" → "su315-25".
/// All other families keep it: "T-373-25" → "t-373-25".
pub fn url_slug(canonical: &str) -> String {
    let lower = canonical.to_lowercase();
    match lower.strip_prefix("su-") {
        Some(rest) => format!("su{rest}"),
        None => lower,
    }
}

/// Alternate written forms of a canonical id, for duplicate matching.
/// Dash, slash, and dot separators are interchangeable in the wild.
pub fn variants(canonical: &str) -> Vec<String> {
    let mut out = vec![canonical.to_string()];

    if let Some((head, year)) = canonical.rsplit_once('-') {
        // Court convention writes the year after a slash: "T-373/25".
        out.push(format!("{head}/{year}"));
    }
    out.push(canonical.replace('-', "."));
    out.push(url_slug(canonical));

    out
}

/// Document family from the canonical id prefix ("T", "C", "SU", "A").
pub fn document_kind(canonical: &str) -> &str {
    canonical.split(['-', '.']).next().unwrap_or(canonical)
}

/// Find and normalize the first sentence id in free text.
pub fn find_in_text(text: &str) -> Option<String> {
    normalize(text)
}
