//! Gemini `generateContent` client.
//!
//! One request per report, no retries. The structured-output schema from
//! [`super::schema`] is attached to every call, and the reply is accepted only
//! if it deserializes completely into [`GeminiResponse`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{GenerationError, ReportGenerator, build_prompt, response_schema};
use crate::config::GeminiConfig;
use crate::models::{GeminiResponse, Patient, SessionData};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body(&self, prompt: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl ReportGenerator for GeminiClient {
    async fn generate(
        &self,
        patient: &Patient,
        age: u32,
        session: &SessionData,
    ) -> Result<GeminiResponse, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential)?;

        let body = self.request_body(build_prompt(patient, age, session));
        info!(model = %self.config.model, "Requesting report generation");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.config.timeout.as_secs())
                } else {
                    GenerationError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::UpstreamStatus { status, body });
        }

        let raw = response.text().await?;
        debug!(bytes = raw.len(), "Generation response received");
        parse_generate_content(&raw)
    }
}

/// Extract the structured report from a raw `generateContent` reply
pub fn parse_generate_content(raw: &str) -> Result<GeminiResponse, GenerationError> {
    let envelope: GenerateContentResponse = serde_json::from_str(raw)?;

    if let Some(reason) = envelope
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GenerationError::Blocked(reason));
    }

    let candidate = envelope
        .candidates
        .into_iter()
        .next()
        .ok_or(GenerationError::NoCandidate)?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason {
            Some(reason) if reason != "STOP" => Err(GenerationError::Blocked(reason)),
            _ => Err(GenerationError::NoCandidate),
        };
    }

    Ok(serde_json::from_str(text.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIXTURE: &str = include_str!("../../tests/fixtures/gemini_response.json");

    fn envelope(text: &str) -> String {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    #[test]
    fn parses_conforming_response() {
        let response = parse_generate_content(&envelope(FIXTURE)).unwrap();
        assert_eq!(response.report_data.needle_retention_time, "30-40 minuti");
        assert_eq!(response.protocol_data.treatment_points_detailed.len(), 2);
    }

    #[test]
    fn joins_split_text_parts() {
        let (head, tail) = FIXTURE.split_at(FIXTURE.find("\"protocolData\"").unwrap());
        let raw = json!({
            "candidates": [{
                "content": { "parts": [{ "text": head }, { "text": tail }] }
            }]
        })
        .to_string();
        assert!(parse_generate_content(&raw).is_ok());
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let mut payload: Value = serde_json::from_str(FIXTURE).unwrap();
        payload["reportData"]
            .as_object_mut()
            .unwrap()
            .remove("tcmDiagnosis");
        let result = parse_generate_content(&envelope(&payload.to_string()));
        assert!(matches!(result, Err(GenerationError::MalformedResponse(_))));
    }

    #[test]
    fn unknown_enum_value_is_malformed() {
        let mut payload: Value = serde_json::from_str(FIXTURE).unwrap();
        payload["protocolData"]["treatmentPointsDetailed"][0]["side"] = json!("Sinistro");
        let result = parse_generate_content(&envelope(&payload.to_string()));
        assert!(matches!(result, Err(GenerationError::MalformedResponse(_))));
    }

    #[test]
    fn free_text_is_malformed() {
        let result = parse_generate_content(&envelope("Ecco il referto richiesto."));
        assert!(matches!(result, Err(GenerationError::MalformedResponse(_))));
    }

    #[test]
    fn empty_candidates_and_blocks() {
        let result = parse_generate_content(r#"{"candidates": []}"#);
        assert!(matches!(result, Err(GenerationError::NoCandidate)));

        let result = parse_generate_content(
            r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#,
        );
        assert!(matches!(result, Err(GenerationError::Blocked(reason)) if reason == "SAFETY"));

        let result = parse_generate_content(
            r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#,
        );
        assert!(matches!(result, Err(GenerationError::Blocked(reason)) if reason == "MAX_TOKENS"));
    }

    #[test]
    fn request_body_carries_schema_and_temperature() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let body = serde_json::to_value(client.request_body("prompt".to_string())).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["responseSchema"], response_schema());
        assert!(client.endpoint().ends_with("/v1beta/models/gemini-2.5-flash:generateContent"));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_request() {
        let client = GeminiClient::new(GeminiConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            ..GeminiConfig::default()
        })
        .unwrap();
        let patient = Patient {
            name: "X".to_string(),
            dob: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone: "1".to_string(),
        };
        let session = SessionData {
            session_number: "1".to_string(),
            main_complaint: "a".to_string(),
            tongue: "b".to_string(),
            pulse: "c".to_string(),
            tcm_answers: Default::default(),
        };
        let result = client.generate(&patient, 36, &session).await;
        assert!(matches!(result, Err(GenerationError::MissingCredential)));
    }
}
