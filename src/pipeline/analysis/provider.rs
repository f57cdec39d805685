//! Hosted LLM providers.
//!
//! Two providers speak the same trait: OpenAI-style chat completions and
//! Gemini's generateContent. Both are asked for a JSON object and both
//! responses pass through the same fence-stripping and parsing path, so
//! the orchestrator never sees provider-specific shapes.

use serde::Deserialize;
use serde_json::json;

use super::{AnalysisError, AnalysisPrompt};

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// The JSON object a provider is asked to return.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderAnalysis {
    pub tema_principal: String,
    pub resumen: String,
    pub decision: String,
    #[serde(default)]
    pub numero_sentencia: Option<String>,
    #[serde(default)]
    pub magistrado_ponente: Option<String>,
    #[serde(default)]
    pub sala_revision: Option<String>,
    #[serde(default)]
    pub expediente: Option<String>,
}

/// A chat model capable of analyzing one prompt.
pub trait AnalysisProvider: Send + Sync {
    /// Stable name recorded as provenance in the output record.
    fn name(&self) -> &str;

    fn analyze(&self, prompt: &AnalysisPrompt) -> Result<ProviderAnalysis, AnalysisError>;
}

/// Build the provider preference list from the environment: OpenAI first
/// when both credentials are present.
pub fn providers_from_env() -> Vec<Box<dyn AnalysisProvider>> {
    let mut providers: Vec<Box<dyn AnalysisProvider>> = Vec::new();

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            let model = std::env::var("RELATORIA_OPENAI_MODEL")
                .unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string());
            providers.push(Box::new(OpenAiProvider::new(key, model)));
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.trim().is_empty() {
            let model = std::env::var("RELATORIA_GEMINI_MODEL")
                .unwrap_or_else(|_| GEMINI_DEFAULT_MODEL.to_string());
            providers.push(Box::new(GeminiProvider::new(key, model)));
        }
    }

    tracing::info!(count = providers.len(), "Analysis providers configured");
    providers
}

fn build_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client")
}

fn map_transport_error(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout(e.to_string())
    } else {
        AnalysisError::Connection(e.to_string())
    }
}

/// Models answer with fenced JSON often enough that stripping is cheaper
/// than re-prompting.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_analysis(raw: &str) -> Result<ProviderAnalysis, AnalysisError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    serde_json::from_str(cleaned).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
}

// ═══════════════════════════════════════════════════════════
// OpenAI
// ═══════════════════════════════════════════════════════════

pub struct OpenAiProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com".to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: build_client(),
            api_key,
            model,
            base_url,
        }
    }
}

impl AnalysisProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    fn analyze(&self, prompt: &AnalysisPrompt) -> Result<ProviderAnalysis, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(AnalysisError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: String,
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(AnalysisError::EmptyResponse)?;

        parse_analysis(content)
    }
}

// ═══════════════════════════════════════════════════════════
// Gemini
// ═══════════════════════════════════════════════════════════

pub struct GeminiProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(
            api_key,
            model,
            "https://generativelanguage.googleapis.com".to_string(),
        )
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: build_client(),
            api_key,
            model,
            base_url,
        }
    }
}

impl AnalysisProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    fn analyze(&self, prompt: &AnalysisPrompt) -> Result<ProviderAnalysis, AnalysisError> {
        let body = json!({
            "system_instruction": {
                "parts": [{ "text": prompt.system }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt.user }]
            }],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json",
            },
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(AnalysisError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Content,
        }
        #[derive(Deserialize)]
        struct Content {
            parts: Vec<Part>,
        }
        #[derive(Deserialize)]
        struct Part {
            text: String,
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or(AnalysisError::EmptyResponse)?;

        parse_analysis(content)
    }
}

// ═══════════════════════════════════════════════════════════
// Test double
// ═══════════════════════════════════════════════════════════

/// Deterministic provider for tests and dry runs.
pub struct MockProvider {
    pub fail: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisProvider for MockProvider {
    fn name(&self) -> &str {
        "mock-analyst"
    }

    fn analyze(&self, prompt: &AnalysisPrompt) -> Result<ProviderAnalysis, AnalysisError> {
        if self.fail {
            return Err(AnalysisError::Connection("mock failure".to_string()));
        }
        Ok(ProviderAnalysis {
            tema_principal: "derecho a la salud".to_string(),
            resumen: format!("Análisis simulado de {} fragmentos.", prompt.fragment_count),
            decision: "Concede el amparo.".to_string(),
            numero_sentencia: None,
            magistrado_ponente: Some("Magistrado Simulado Pérez".to_string()),
            sala_revision: None,
            expediente: Some("X-99.999".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_stripping_variants() {
        let plain = r#"{"a":1}"#;
        assert_eq!(strip_code_fences(plain), plain);
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn parse_accepts_missing_optional_fields() {
        let raw = r#"{"tema_principal":"salud","resumen":"r","decision":"d"}"#;
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.tema_principal, "salud");
        assert_eq!(analysis.expediente, None);
    }

    #[test]
    fn parse_accepts_null_structural_fields() {
        let raw = r#"{"tema_principal":"t","resumen":"r","decision":"d",
                      "numero_sentencia":null,"magistrado_ponente":"Ana María Ruiz",
                      "sala_revision":null,"expediente":null}"#;
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.magistrado_ponente.as_deref(), Some("Ana María Ruiz"));
        assert_eq!(analysis.numero_sentencia, None);
    }

    #[test]
    fn parse_rejects_prose() {
        let err = parse_analysis("Lo siento, no puedo analizar este documento.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(matches!(parse_analysis("   "), Err(AnalysisError::EmptyResponse)));
        assert!(matches!(parse_analysis("```json\n```"), Err(AnalysisError::EmptyResponse)));
    }

    #[test]
    fn mock_provider_round_trip() {
        let provider = MockProvider::new();
        let prompt = AnalysisPrompt {
            system: String::new(),
            user: String::new(),
            fragment_count: 2,
        };
        let analysis = provider.analyze(&prompt).unwrap();
        assert!(analysis.resumen.contains('2'));
        assert!(MockProvider::failing().analyze(&prompt).is_err());
    }
}
