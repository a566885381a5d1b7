use crate::CompletionProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::settings::{AssistantSettings, GenerationSettings};
use shared::AssistError;
use tracing::{debug, error};

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    stop_sequences: Vec<String>,
}

impl From<&GenerationSettings> for GenerationConfig {
    fn from(g: &GenerationSettings) -> Self {
        Self {
            temperature: g.temperature,
            top_k: g.top_k,
            top_p: g.top_p,
            max_output_tokens: g.max_output_tokens,
            stop_sequences: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: Option<String>,
}

pub struct GeminiClient {
    http: Client,
    endpoint: String,
    model: String,
    generation: GenerationSettings,
}

impl GeminiClient {
    pub fn new(settings: &AssistantSettings) -> Result<Self, AssistError> {
        // No client-side timeout: the request lives as long as the transport allows.
        let http = Client::builder()
            .build()
            .map_err(|e| AssistError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: settings.api_endpoint.trim_end_matches('/').to_string(),
            model: settings.gemini_model.clone(),
            generation: settings.generation.clone(),
        })
    }

    fn request_body(&self, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            safety_settings: vec![SafetySetting {
                category: "HARM_CATEGORY_DANGEROUS_CONTENT".to_string(),
                threshold: "BLOCK_NONE".to_string(),
            }],
            generation_config: GenerationConfig::from(&self.generation),
        }
    }

    pub async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, AssistError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        debug!("POST {} ({} prompt chars)", url, prompt.len());

        let resp = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| AssistError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("API request failed with status {}", status.as_u16()));
            error!("Gemini API error {}: {}", status, message);
            return Err(AssistError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| AssistError::Transport(e.to_string()))?;
        extract_text(body)
    }
}

fn extract_text(body: GeminiResponse) -> Result<String, AssistError> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AssistError::Blocked { reason });
    }
    let first = body.candidates.into_iter().next().ok_or(AssistError::NoCandidates)?;
    let text = first
        .content
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AssistError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, AssistError> {
        self.generate(api_key, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    struct Captured {
        url: String,
        body: serde_json::Value,
    }

    /// One-shot HTTP server answering a single request with `status` and `body`.
    fn serve_once(status: u16, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", server.server_addr().to_ip().unwrap());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut raw = String::new();
                request.as_reader().read_to_string(&mut raw).unwrap();
                let _ = tx.send(Captured {
                    url: request.url().to_string(),
                    body: serde_json::from_str(&raw).unwrap_or_default(),
                });
                let response = tiny_http::Response::from_string(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });
        (addr, rx)
    }

    fn client_for(endpoint: &str) -> GeminiClient {
        let settings = AssistantSettings {
            api_endpoint: endpoint.to_string(),
            ..AssistantSettings::default()
        };
        GeminiClient::new(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_expected_request() {
        let (addr, rx) = serve_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"Use a hash map."}]}}]}"#,
        );
        let text = client_for(&addr).generate("k-1", "How?").await.unwrap();
        assert_eq!(text, "Use a hash map.");

        let captured = rx.recv().unwrap();
        assert_eq!(
            captured.url,
            "/models/gemini-2.0-flash:generateContent?key=k-1"
        );
        assert_eq!(captured.body["contents"][0]["parts"][0]["text"], "How?");
        assert_eq!(
            captured.body["safetySettings"][0]["threshold"],
            "BLOCK_NONE"
        );
        assert_eq!(captured.body["generationConfig"]["topK"], 40);
        assert_eq!(captured.body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[tokio::test]
    async fn test_non_success_uses_api_message() {
        let (addr, _rx) = serve_once(400, r#"{"error":{"message":"API key not valid."}}"#);
        let err = client_for(&addr).generate("bad", "hi").await.unwrap_err();
        match err {
            AssistError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_success_without_json_body() {
        let (addr, _rx) = serve_once(503, "upstream down");
        let err = client_for(&addr).generate("k", "hi").await.unwrap_err();
        assert_eq!(err.to_string(), "API request failed with status 503");
    }

    #[test]
    fn test_block_reason_and_empty_payloads() {
        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(
            extract_text(blocked),
            Err(AssistError::Blocked { reason }) if reason == "SAFETY"
        ));

        let none: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(extract_text(none), Err(AssistError::NoCandidates)));

        let empty: GeminiResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#)
                .unwrap();
        assert!(matches!(extract_text(empty), Err(AssistError::EmptyResponse)));
    }
}
