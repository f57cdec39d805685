//! Prompt construction for case analysis.
//!
//! The model never sees the whole opinion: the prompt carries bounded
//! excerpts of the sections that matter (considerations for the
//! reasoning, resolution for the orders, header for identification) and
//! demands a strict JSON object back.

use serde::Serialize;

use crate::pipeline::types::{SegmentedText, StructuralMetadata};

/// Character budget per section excerpt.
const CONSIDERATIONS_BUDGET: usize = 6_000;
const RESOLUTION_BUDGET: usize = 4_000;
const HEADER_BUDGET: usize = 1_200;

/// A ready-to-send analysis request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
    /// Number of non-empty excerpts included, recorded for provenance.
    pub fragment_count: u32,
}

const SYSTEM_PROMPT: &str = "\
Eres un asistente jurídico especializado en jurisprudencia de la Corte \
Constitucional de Colombia. Analiza los fragmentos de la sentencia y \
responde ÚNICAMENTE con un objeto JSON válido, sin texto adicional ni \
bloques de código, con exactamente estas claves:\n\
{\n\
  \"tema_principal\": \"tema central, máximo 20 palabras\",\n\
  \"resumen\": \"resumen del caso y su razonamiento, máximo 150 palabras\",\n\
  \"decision\": \"qué resolvió la Corte, máximo 120 palabras\",\n\
  \"numero_sentencia\": \"número de la sentencia o null\",\n\
  \"magistrado_ponente\": \"nombre del magistrado ponente o null\",\n\
  \"sala_revision\": \"sala que decidió o null\",\n\
  \"expediente\": \"número de expediente o null\"\n\
}";

/// Build the prompt for one opinion.
///
/// Known structural fields are included as context so the model does not
/// waste output tokens re-deriving them; unknown ones it may fill in.
pub fn build_prompt(segmented: &SegmentedText, known: &StructuralMetadata) -> AnalysisPrompt {
    let mut user = String::new();
    let mut fragment_count = 0u32;

    let header = truncate_chars(&segmented.header, HEADER_BUDGET);
    if !header.is_empty() {
        user.push_str("ENCABEZADO:\n");
        user.push_str(&header);
        user.push_str("\n\n");
        fragment_count += 1;
    }

    let considerations = truncate_chars(&segmented.considerations, CONSIDERATIONS_BUDGET);
    if !considerations.is_empty() {
        user.push_str("CONSIDERACIONES (extracto):\n");
        user.push_str(&considerations);
        user.push_str("\n\n");
        fragment_count += 1;
    }

    let resolution = truncate_chars(&segmented.resolution, RESOLUTION_BUDGET);
    if !resolution.is_empty() {
        user.push_str("PARTE RESOLUTIVA (extracto):\n");
        user.push_str(&resolution);
        user.push_str("\n\n");
        fragment_count += 1;
    }

    if !known.is_empty() {
        user.push_str("DATOS YA CONFIRMADOS (no los contradigas):\n");
        if let Some(n) = &known.numero_sentencia {
            user.push_str(&format!("- numero_sentencia: {n}\n"));
        }
        if let Some(m) = &known.magistrado_ponente {
            user.push_str(&format!("- magistrado_ponente: {m}\n"));
        }
        if let Some(s) = &known.sala_revision {
            user.push_str(&format!("- sala_revision: {s}\n"));
        }
        if let Some(e) = &known.expediente {
            user.push_str(&format!("- expediente: {e}\n"));
        }
    }

    AnalysisPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        fragment_count,
    }
}

/// Truncate to a character budget without splitting a code point.
fn truncate_chars(text: &str, budget: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= budget {
        return trimmed.to_string();
    }
    trimmed.chars().take(budget).collect()
}
