//! Backend for calling the Gemini `generateContent` API directly.
//!
//! Endpoint: `{base}/v1beta/models/{model}:generateContent?key={api_key}`.
//! The instructional context travels in `systemInstruction`, and JSON mode
//! maps to `generationConfig.responseMimeType = "application/json"`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Backend, GenerationRequest, TransportReply};
use crate::error::{FlowError, Result};

/// Public Gemini API host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Direct provider backend with an embedded API key.
///
/// # Example
///
/// ```
/// use grammarflow::backend::GeminiBackend;
///
/// let backend = GeminiBackend::new("AIza-test-key").with_model("gemini-2.0-flash");
/// assert_eq!(backend.model(), "gemini-2.0-flash");
/// ```
#[derive(Clone)]
pub struct GeminiBackend {
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.chars().count() > 6 {
            format!("{}***", self.api_key.chars().take(6).collect::<String>())
        } else {
            "***".to_string()
        };
        f.debug_struct("GeminiBackend")
            .field("api_key", &key)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, base_url: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_body(request: &GenerationRequest) -> GeminiRequest<'_> {
        let system_instruction = if request.system_instruction.trim().is_empty() {
            None
        } else {
            Some(Content {
                parts: vec![Part {
                    text: &request.system_instruction,
                }],
            })
        };
        GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction,
            generation_config: request.json_mode.then_some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        }
    }

    /// Text of the first part of the first candidate. Blocked prompts and
    /// candidate-less replies yield an empty string.
    fn extract_text(body: &str) -> Result<String> {
        let resp: GeminiResponse = serde_json::from_str(body)?;
        Ok(resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &GenerationRequest,
    ) -> Result<TransportReply> {
        let url = self.endpoint(base_url);
        let resp = client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_body(request))
            .send()
            .await
            // reqwest errors carry the URL, which includes the key.
            .map_err(|e| FlowError::Other(format!("Failed to reach {}: {}", url, e.without_url())))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FlowError::HttpError { status, body });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FlowError::Other(e.without_url().to_string()))?;
        let text = Self::extract_text(&body)?;
        Ok(TransportReply { text, status })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
