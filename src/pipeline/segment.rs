//! Section segmentation of an extracted opinion.
//!
//! Constitutional court opinions follow a stable shape: a formal header,
//! antecedents, a "CONSIDERACIONES" section carrying the legal reasoning,
//! and a closing "RESUELVE" with the orders. Segmentation is heading
//! driven and tolerant: a missing heading degrades to a generic slice
//! instead of failing the document.

use crate::config::ExtractorConfig;

use super::types::SegmentedText;

/// Fraction boundaries of the generic slice used when the considerations
/// heading is missing or its section is too thin.
const FALLBACK_SLICE: (f64, f64) = (0.30, 0.70);

/// Paragraphs scanned from the end for a late standalone "RESUELVE".
const RESOLUTION_TAIL_SCAN: usize = 10;

/// Split an opinion's plain text into its canonical sections.
pub fn segment(full_text: &str, config: &ExtractorConfig) -> SegmentedText {
    let paragraphs: Vec<&str> = full_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let header = paragraphs
        .iter()
        .take(config.header_lines)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    let considerations_idx = paragraphs
        .iter()
        .position(|p| fold(p).contains("CONSIDERACIONES"));

    let resolution_idx = find_resolution_trigger(&paragraphs, considerations_idx);

    // Everything after the trigger belongs to the resolution, however long.
    let resolution = match resolution_idx {
        Some(r) => paragraphs[r + 1..].join("\n"),
        None => String::new(),
    };

    let considerations = match considerations_idx {
        Some(c) => {
            let end = resolution_idx.filter(|r| *r > c).unwrap_or(paragraphs.len());
            let section = paragraphs[c..end].join("\n");
            if section.chars().count() < config.min_considerations_chars {
                middle_slice(full_text)
            } else {
                section
            }
        }
        None => middle_slice(full_text),
    };

    let other = match considerations_idx {
        Some(c) if c > config.header_lines => paragraphs[config.header_lines..c]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        _ => Vec::new(),
    };

    SegmentedText {
        full_text: full_text.to_string(),
        header,
        considerations,
        resolution,
        other,
    }
}

/// Locate the paragraph that opens the resolution section.
///
/// Primary: a heading-shaped "RESUELVE" (optionally roman-numbered) or the
/// formulaic "EN MERITO DE LO EXPUESTO" lead-in, at or after the
/// considerations. Fallback: a standalone "RESUELVE" word in the last few
/// paragraphs, for opinions that inline the heading.
fn find_resolution_trigger(paragraphs: &[&str], from: Option<usize>) -> Option<usize> {
    let start = from.unwrap_or(0);

    let primary = paragraphs[start..].iter().position(|p| {
        let folded = fold(p);
        is_resolution_heading(&folded) || folded.contains("EN MERITO DE LO EXPUESTO")
    });
    if let Some(offset) = primary {
        return Some(start + offset);
    }

    let tail_start = paragraphs.len().saturating_sub(RESOLUTION_TAIL_SCAN);
    paragraphs[tail_start..]
        .iter()
        .position(|p| fold(p).split_whitespace().any(|w| w == "RESUELVE"))
        .map(|offset| tail_start + offset)
}

/// "RESUELVE", "RESUELVE:", "III. RESUELVE" and the like, as a whole
/// paragraph.
fn is_resolution_heading(folded: &str) -> bool {
    let mut rest = folded.trim();

    // Optional roman numeral prefix.
    let numeral_len = rest.chars().take_while(|c| matches!(c, 'I' | 'V' | 'X')).count();
    if numeral_len > 0 && rest[numeral_len..].starts_with(['.', ' ']) {
        rest = rest[numeral_len..].trim_start_matches(['.', ' ']).trim();
    }

    rest == "RESUELVE" || rest == "RESUELVE:"
}

/// Middle portion of the full text, cut on char boundaries.
fn middle_slice(full_text: &str) -> String {
    let total = full_text.chars().count();
    let start = (total as f64 * FALLBACK_SLICE.0) as usize;
    let end = (total as f64 * FALLBACK_SLICE.1) as usize;
    full_text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Uppercase and strip diacritics for heading comparison.
fn fold(text: &str) -> String {
    text.to_uppercase()
        .chars()
        .map(|c| match c {
            'Á' => 'A',
            'É' => 'E',
            'Í' => 'I',
            'Ó' => 'O',
            'Ú' | 'Ü' => 'U',
            'Ñ' => 'N',
            _ => c,
        })
        .collect()
}
