//! Backend for the first-party generation relay.
//!
//! [`RelayBackend`] posts to `{base}/api/generate` with
//! `{"prompt", "systemInstruction", "jsonMode"}` and reads the `text` field
//! of the JSON reply. The relay holds the provider credentials, so nothing
//! secret lives in the client. Free-tier relays can take close to a minute
//! to wake up, which is why sessions pair this backend with a 60s timeout and
//! [`BackoffConfig::relay()`](super::BackoffConfig::relay).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Backend, GenerationRequest, TransportReply};
use crate::error::{FlowError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    prompt: &'a str,
    system_instruction: &'a str,
    json_mode: bool,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Backend for the relay service.
#[derive(Debug, Clone, Default)]
pub struct RelayBackend;

impl RelayBackend {
    pub fn new() -> Self {
        Self
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/api/generate", base_url.trim_end_matches('/'))
    }

    fn build_body(request: &GenerationRequest) -> RelayRequest<'_> {
        RelayRequest {
            prompt: &request.prompt,
            system_instruction: &request.system_instruction,
            json_mode: request.json_mode,
        }
    }

    /// Pull the generated text out of a relay reply; a missing or null
    /// `text` counts as empty output.
    fn extract_text(body: &str) -> Result<String> {
        let resp: RelayResponse = serde_json::from_str(body)?;
        Ok(resp.text.unwrap_or_default())
    }
}

#[async_trait]
impl Backend for RelayBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &GenerationRequest,
    ) -> Result<TransportReply> {
        let url = Self::endpoint(base_url);
        let resp = client
            .post(&url)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| FlowError::Other(format!("Failed to reach relay at {}: {}", url, e)))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FlowError::HttpError { status, body });
        }

        let body = resp.text().await?;
        let text = Self::extract_text(&body)?;
        Ok(TransportReply { text, status })
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}
