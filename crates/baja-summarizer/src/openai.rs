use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// OpenAI-compatible chat completions client bound to a single model.
///
/// OpenRouter is the default deployment target; any endpoint that accepts
/// `POST {base_url}/v1/chat/completions` with multi-part user content works.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    referer: Option<String>,
    title: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            referer: None,
            title: None,
        }
    }

    /// Attribution headers OpenRouter shows on its dashboard.
    pub fn with_attribution(mut self, referer: Option<String>, title: Option<String>) -> Self {
        self.referer = referer;
        self.title = title;
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(&self.model, req);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %self.model, blocks = req.content.len(), "sending chat completion");

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json");
        if let Some(ref referer) = self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(ref title) = self.title {
            builder = builder.header("X-Title", title);
        }

        let resp = builder.json(&body).send().await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000) // seconds to ms
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, model = %self.model, body = %text, "chat completion API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp, &self.model))
    }
}

fn build_request_body(model: &str, req: &ChatRequest) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": req.system },
            { "role": "user", "content": req.content },
        ],
        "max_tokens": req.max_tokens,
    })
}

fn parse_response(resp: ApiResponse, requested_model: &str) -> ChatResponse {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    ChatResponse {
        content,
        model: resp.model.unwrap_or_else(|| requested_model.to_string()),
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp
            .usage
            .as_ref()
            .map(|u| u.completion_tokens)
            .unwrap_or(0),
    }
}

// Chat completions response types (deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ContentBlock;

    #[test]
    fn request_body_carries_system_and_blocks() {
        let req = ChatRequest {
            system: "be brief".to_string(),
            content: vec![ContentBlock::text("[09:00] ana: hi\n")],
            max_tokens: 256,
        };
        let body = build_request_body("google/gemini-2.0-flash-001", &req);
        assert_eq!(body["model"], "google/gemini-2.0-flash-001");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["content"][0]["type"], "text");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn response_without_usage_or_model_still_parses() {
        let raw = r#"{"choices":[{"message":{"content":"- topic"}}]}"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let parsed = parse_response(resp, "openrouter/auto");
        assert_eq!(parsed.content, "- topic");
        assert_eq!(parsed.model, "openrouter/auto");
        assert_eq!(parsed.tokens_in, 0);
    }
}
