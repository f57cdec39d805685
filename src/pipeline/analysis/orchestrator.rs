//! Analysis orchestration and merge policy.
//!
//! The orchestrator turns a segmented opinion into a `CaseAnalysis`:
//! build the prompt, run it through the queue, then merge. The merge
//! policy is fixed: narrative fields always come from the model;
//! structural fields prefer the deterministic extraction and use the
//! model's guess only to fill gaps. Confidence reflects how much of the
//! record is regex-backed.

use crate::pipeline::types::{CaseAnalysis, SegmentedText, StructuralMetadata};

use super::prompt::build_prompt;
use super::provider::ProviderAnalysis;
use super::queue::AnalysisQueue;
use super::AnalysisError;

/// Confidence floor for a record whose structural fields are all guesses.
const BASE_CONFIDENCE: f32 = 0.5;
/// Added per regex-validated structural field.
const CONFIDENCE_PER_FIELD: f32 = 0.1;

pub struct AnalysisOrchestrator {
    queue: AnalysisQueue,
}

impl AnalysisOrchestrator {
    pub fn new(queue: AnalysisQueue) -> Self {
        Self { queue }
    }

    /// Analyze one opinion. Blocks until the queue reaches this job.
    pub fn analyze(
        &self,
        segmented: &SegmentedText,
        structural: &StructuralMetadata,
    ) -> Result<CaseAnalysis, AnalysisError> {
        let prompt = build_prompt(segmented, structural);
        let fragment_count = prompt.fragment_count;

        let rx = self.queue.enqueue(prompt);
        let (provider_analysis, provider_name) =
            rx.recv().map_err(|_| AnalysisError::QueueClosed)??;

        Ok(merge_analysis(
            provider_analysis,
            structural,
            &provider_name,
            fragment_count,
        ))
    }
}

/// Merge the model's answer with the deterministic extraction.
pub fn merge_analysis(
    provider: ProviderAnalysis,
    structural: &StructuralMetadata,
    provider_name: &str,
    fragment_count: u32,
) -> CaseAnalysis {
    let confidencia = BASE_CONFIDENCE + CONFIDENCE_PER_FIELD * structural.field_count() as f32;

    CaseAnalysis {
        tema_principal: provider.tema_principal,
        resumen_ia: provider.resumen,
        decision: provider.decision,
        numero_sentencia: structural
            .numero_sentencia
            .clone()
            .or(provider.numero_sentencia),
        magistrado_ponente: structural
            .magistrado_ponente
            .clone()
            .or(provider.magistrado_ponente),
        sala_revision: structural.sala_revision.clone().or(provider.sala_revision),
        expediente: structural.expediente.clone().or(provider.expediente),
        modelo_usado: provider_name.to_string(),
        confidencia,
        fragmentos_analizados: fragment_count,
    }
}

/// Deterministic-only analysis for runs without any provider configured.
pub fn deterministic_only(structural: &StructuralMetadata) -> CaseAnalysis {
    CaseAnalysis {
        tema_principal: String::new(),
        resumen_ia: String::new(),
        decision: String::new(),
        numero_sentencia: structural.numero_sentencia.clone(),
        magistrado_ponente: structural.magistrado_ponente.clone(),
        sala_revision: structural.sala_revision.clone(),
        expediente: structural.expediente.clone(),
        modelo_usado: "deterministic-only".to_string(),
        confidencia: BASE_CONFIDENCE + CONFIDENCE_PER_FIELD * structural.field_count() as f32,
        fragmentos_analizados: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::provider::MockProvider;

    fn provider_answer() -> ProviderAnalysis {
        ProviderAnalysis {
            tema_principal: "derecho a la salud".to_string(),
            resumen: "resumen del caso".to_string(),
            decision: "concede".to_string(),
            numero_sentencia: Some("T-999-99".to_string()),
            magistrado_ponente: Some("Nombre Inventado Por Modelo".to_string()),
            sala_revision: None,
            expediente: Some("Z-11.111".to_string()),
        }
    }

    #[test]
    fn regex_fields_override_model_guesses() {
        let structural = StructuralMetadata {
            numero_sentencia: Some("T-100-25".to_string()),
            expediente: Some("D-15.479".to_string()),
            ..StructuralMetadata::default()
        };

        let merged = merge_analysis(provider_answer(), &structural, "gpt-4o-mini", 3);

        assert_eq!(merged.numero_sentencia.as_deref(), Some("T-100-25"));
        assert_eq!(merged.expediente.as_deref(), Some("D-15.479"));
        // Gap filled by the model.
        assert_eq!(
            merged.magistrado_ponente.as_deref(),
            Some("Nombre Inventado Por Modelo")
        );
        assert_eq!(merged.modelo_usado, "gpt-4o-mini");
    }

    #[test]
    fn confidence_tracks_regex_field_count() {
        let empty = StructuralMetadata::default();
        let merged = merge_analysis(provider_answer(), &empty, "m", 3);
        assert!((merged.confidencia - 0.5).abs() < f32::EPSILON);

        let full = StructuralMetadata {
            numero_sentencia: Some("T-100-25".to_string()),
            magistrado_ponente: Some("Jorge Enrique Ibáñez Najar".to_string()),
            sala_revision: Some("Sala Plena".to_string()),
            expediente: Some("D-15.479".to_string()),
        };
        let merged = merge_analysis(provider_answer(), &full, "m", 3);
        assert!((merged.confidencia - 0.9).abs() < 1e-6);
    }

    #[test]
    fn narrative_fields_come_from_the_model() {
        let merged = merge_analysis(provider_answer(), &StructuralMetadata::default(), "m", 2);
        assert_eq!(merged.tema_principal, "derecho a la salud");
        assert_eq!(merged.resumen_ia, "resumen del caso");
        assert_eq!(merged.decision, "concede");
        assert_eq!(merged.fragmentos_analizados, 2);
    }

    #[test]
    fn deterministic_only_marks_provenance() {
        let structural = StructuralMetadata {
            numero_sentencia: Some("T-100-25".to_string()),
            ..StructuralMetadata::default()
        };
        let analysis = deterministic_only(&structural);
        assert_eq!(analysis.modelo_usado, "deterministic-only");
        assert_eq!(analysis.fragmentos_analizados, 0);
        assert!(analysis.tema_principal.is_empty());
        assert_eq!(analysis.numero_sentencia.as_deref(), Some("T-100-25"));
    }

    #[test]
    fn orchestrator_runs_end_to_end_with_mock() {
        let queue = AnalysisQueue::start(vec![Box::new(MockProvider::new())], 0);
        let orchestrator = AnalysisOrchestrator::new(queue);

        let segmented = SegmentedText {
            full_text: String::new(),
            header: "Sentencia T-100/25".to_string(),
            considerations: "consideraciones".to_string(),
            resolution: "RESUELVE".to_string(),
            other: Vec::new(),
        };
        let structural = StructuralMetadata {
            numero_sentencia: Some("T-100-25".to_string()),
            ..StructuralMetadata::default()
        };

        let analysis = orchestrator.analyze(&segmented, &structural).unwrap();
        assert_eq!(analysis.modelo_usado, "mock-analyst");
        assert_eq!(analysis.numero_sentencia.as_deref(), Some("T-100-25"));
        assert_eq!(analysis.fragmentos_analizados, 3);
    }
}
