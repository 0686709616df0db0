//! AI-assisted diagnosis and treatment suggestions.
//!
//! A [`DiagnosisAssistant`] turns the doctor's intake (symptoms, initial assessment, age
//! and sex) into a suggested diagnosis paragraph and a bulleted treatment plan by prompting
//! a text-generation model. The assistant never fails: any upstream problem yields a fixed
//! fallback pair marked with [`AssessmentSource::Fallback`] so callers can flag the record
//! for manual review.

use crate::constants::{DEFAULT_GEMINI_MODEL, GEMINI_API_BASE};
use async_trait::async_trait;
use medirx_types::Sex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

static DIAGNOSIS_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)DIAGNOSIS:\s*(.*?)(?:TREATMENT:|\z)").expect("valid diagnosis regex")
});
static TREATMENT_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)TREATMENT:\s*(.*)").expect("valid treatment regex"));
static BULLET_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[-•][ \t]*|\*[ \t]+)").expect("valid bullet regex")
});

const FALLBACK_TREATMENT: &str = "• Rest and adequate hydration.\n\
• Over-the-counter pain relief medication as needed for discomfort.\n\
• Monitor symptoms and return if condition worsens.\n\
• Follow-up appointment in 7-10 days to reassess.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation service returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
}

/// Sampling settings sent with each generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: GEMINI_API_BASE.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
                max_output_tokens: params.max_output_tokens,
            },
        };

        tracing::debug!(model = %self.model, "sending generation request");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::MalformedResponse("missing candidate text".into())
            })
    }
}

/// Where an assessment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Model,
    Fallback,
}

/// A suggested diagnosis and treatment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub diagnosis: String,
    pub treatment: String,
    pub source: AssessmentSource,
}

impl Assessment {
    pub fn is_fallback(&self) -> bool {
        self.source == AssessmentSource::Fallback
    }
}

/// Produces assessments from a [`TextGenerator`].
#[derive(Clone)]
pub struct DiagnosisAssistant {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl DiagnosisAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            params: GenerationParams::default(),
        }
    }

    /// Generates a diagnosis and treatment plan. Never fails.
    pub async fn generate(&self, symptoms: &str, note: &str, age: u32, sex: Sex) -> Assessment {
        let prompt = build_prompt(symptoms, note, age, sex);

        let raw = match self.generator.generate_text(&prompt, &self.params).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "diagnosis generation failed, using fallback");
                return Assessment {
                    diagnosis: fallback_diagnosis(symptoms),
                    treatment: FALLBACK_TREATMENT.to_string(),
                    source: AssessmentSource::Fallback,
                };
            }
        };

        let (diagnosis, treatment) = extract_sections(&raw);
        let mut source = AssessmentSource::Model;

        let diagnosis = if diagnosis.is_empty() {
            tracing::warn!("generated response had no diagnosis section, using fallback");
            source = AssessmentSource::Fallback;
            fallback_diagnosis(symptoms)
        } else {
            diagnosis
        };
        let treatment = if treatment.is_empty() {
            tracing::warn!("generated response had no treatment section, using fallback");
            source = AssessmentSource::Fallback;
            FALLBACK_TREATMENT.to_string()
        } else {
            treatment
        };

        Assessment {
            diagnosis,
            treatment,
            source,
        }
    }
}

fn build_prompt(symptoms: &str, note: &str, age: u32, sex: Sex) -> String {
    format!(
        "Acting as an expert medical professional, provide a detailed medical diagnosis and \
treatment plan based on the following information:

Patient Information:
- Age: {age}
- Sex: {sex}
- Symptoms: {symptoms}
- Doctor's initial diagnosis description: {note}

First, write a paragraph starting with \"DIAGNOSIS: \" that provides a professional, detailed \
explanation of the most likely medical condition based on the provided information.

Then, provide a section starting with \"TREATMENT: \" that includes a concise treatment plan \
with 3-5 specific bullet points. Each bullet point should be brief (1-2 sentences maximum) and \
should address:
- Medications (with dosage when applicable)
- Lifestyle recommendations
- Follow-up care suggestions
- Any special instructions

Format each bullet point with a dash or bullet and place important terms in *asterisks* to \
indicate they should be bolded.

Keep the response concise and professional. Use medical terminology appropriately but keep it \
clear to patients."
    )
}

/// Splits a raw model response into (diagnosis, treatment), both trimmed.
fn extract_sections(raw: &str) -> (String, String) {
    let diagnosis = DIAGNOSIS_SECTION
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let treatment = TREATMENT_SECTION
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| normalize_bullets(m.as_str().trim()))
        .unwrap_or_default();

    (diagnosis, treatment)
}

fn normalize_bullets(treatment: &str) -> String {
    BULLET_PREFIX
        .replace_all(treatment, "• ")
        .trim()
        .to_string()
}

fn fallback_diagnosis(symptoms: &str) -> String {
    format!(
        "Based on the reported symptoms ({symptoms}) and the doctor's initial assessment, a \
preliminary diagnosis indicates a potential medical condition that requires further evaluation."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{self, Block, Container};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Mutex;

    struct CannedGenerator {
        response: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedGenerator {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                response: Err(status),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate_text(
            &self,
            prompt: &str,
            params: &GenerationParams,
        ) -> Result<String, GenerationError> {
            assert_eq!(*params, GenerationParams::default());
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(GenerationError::Upstream {
                    status: *status,
                    body: String::new(),
                }),
            }
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_extract_sections_case_insensitive() {
        let raw = "diagnosis: Acute viral pharyngitis.\n\ntreatment:\n- Rest\n* *Paracetamol* 500mg\n•Fluids";
        let (diagnosis, treatment) = extract_sections(raw);
        assert_eq!(diagnosis, "Acute viral pharyngitis.");
        assert_eq!(treatment, "• Rest\n• *Paracetamol* 500mg\n• Fluids");
    }

    #[test]
    fn test_extract_sections_without_treatment() {
        let (diagnosis, treatment) = extract_sections("DIAGNOSIS: Migraine");
        assert_eq!(diagnosis, "Migraine");
        assert!(treatment.is_empty());
    }

    #[test]
    fn test_bold_term_at_line_start_is_not_a_bullet() {
        assert_eq!(normalize_bullets("*Ibuprofen* 400mg"), "*Ibuprofen* 400mg");
    }

    #[test]
    fn test_fallback_treatment_formats_as_list() {
        assert_eq!(Container::for_text(FALLBACK_TREATMENT), Container::List);
        let blocks = markdown::format(FALLBACK_TREATMENT);
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| matches!(b, Block::ListItem(_))));
    }

    #[tokio::test]
    async fn test_generate_uses_model_sections() {
        let generator = CannedGenerator::ok(
            "DIAGNOSIS: Tension headache.\nTREATMENT:\n- *Rest* in a dark room\n- Hydrate",
        );
        let assistant = DiagnosisAssistant::new(generator.clone());

        let assessment = assistant
            .generate("headache", "likely tension", 34, Sex::Female)
            .await;

        assert_eq!(assessment.source, AssessmentSource::Model);
        assert_eq!(assessment.diagnosis, "Tension headache.");
        assert_eq!(assessment.treatment, "• *Rest* in a dark room\n• Hydrate");

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("- Age: 34"));
        assert!(prompts[0].contains("- Sex: Female"));
        assert!(prompts[0].contains("- Symptoms: headache"));
        assert!(prompts[0].contains("likely tension"));
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_failure() {
        let assistant = DiagnosisAssistant::new(CannedGenerator::failing(500));

        let assessment = assistant.generate("fever", "flu?", 20, Sex::Male).await;

        assert!(assessment.is_fallback());
        assert!(assessment.diagnosis.contains("(fever)"));
        assert_eq!(assessment.treatment, FALLBACK_TREATMENT);
    }

    #[tokio::test]
    async fn test_generate_falls_back_per_empty_section() {
        let assistant =
            DiagnosisAssistant::new(CannedGenerator::ok("DIAGNOSIS: Sprained ankle."));

        let assessment = assistant.generate("ankle pain", "sprain", 25, Sex::Other).await;

        assert!(assessment.is_fallback());
        assert_eq!(assessment.diagnosis, "Sprained ankle.");
        assert_eq!(assessment.treatment, FALLBACK_TREATMENT);
    }

    #[tokio::test]
    async fn test_gemini_client_sends_config_and_key_header() {
        let app = Router::new().route(
            "/v1beta/models/gemini-2.0-flash:generateContent",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["x-goog-api-key"], "test-key");
                assert_eq!(body["generationConfig"]["topK"], 40);
                assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
                assert!(body["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .unwrap()
                    .contains("DIAGNOSIS"));
                Json(serde_json::json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": "DIAGNOSIS: ok TREATMENT: - rest" }] }
                    }]
                }))
            }),
        );
        let base = serve(app).await;
        let client = GeminiClient::new("test-key", None).with_endpoint(base);

        let text = client
            .generate_text(
                &build_prompt("s", "n", 1, Sex::Male),
                &GenerationParams::default(),
            )
            .await
            .expect("generation should succeed");
        assert_eq!(text, "DIAGNOSIS: ok TREATMENT: - rest");
    }

    #[tokio::test]
    async fn test_gemini_client_maps_error_status() {
        let app = Router::new().route(
            "/v1beta/models/gemini-2.0-flash:generateContent",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;
        let client = GeminiClient::new("k", None).with_endpoint(base);

        let err = client
            .generate_text("p", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Upstream { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_gemini_client_rejects_missing_candidates() {
        let app = Router::new().route(
            "/v1beta/models/gemini-2.0-flash:generateContent",
            post(|| async { Json(serde_json::json!({ "candidates": [] })) }),
        );
        let base = serve(app).await;
        let client = GeminiClient::new("k", None).with_endpoint(base);

        let err = client
            .generate_text("p", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_assistant_over_failing_upstream_returns_fallback() {
        let app = Router::new().route(
            "/v1beta/models/gemini-2.0-flash:generateContent",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(app).await;
        let client = GeminiClient::new("k", None).with_endpoint(base);
        let assistant = DiagnosisAssistant::new(Arc::new(client));

        let assessment = assistant.generate("cough", "bronchitis", 60, Sex::Male).await;
        assert!(assessment.is_fallback());
    }
}
