//! Non-streaming OpenAI-compatible chat client. Works with OpenAI, Ollama,
//! vLLM, Groq, OpenRouter, etc.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use codecrew_core::config::ModelConfig;
use codecrew_core::error::{CrewError, Result};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// One turn of a chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

// Request/response types

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Thin chat-completions client bound to one [`ModelConfig`].
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    config: ModelConfig,
}

impl ChatClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_API_URL)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// Send a chat request and return the assistant's text.
    pub async fn chat(&self, messages: &[ChatTurn]) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| CrewError::LlmRequest("no API key configured".into()))?;

        let body = ChatRequest {
            model: &self.config.model_id,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
        };

        debug!(model = %self.config.model_id, turns = messages.len(), "Sending chat request");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CrewError::LlmRequest(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CrewError::LlmRequest(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(CrewError::LlmRequest(format!("HTTP {}: {}", status, detail)));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| CrewError::LlmParse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CrewError::LlmParse("response carried no content".into()))
    }
}

/// Pull the first JSON object out of an LLM reply, tolerating markdown
/// code fences and surrounding prose.
pub fn extract_json(raw: &str) -> Result<serde_json::Value> {
    let trimmed = raw.trim();

    // Fenced block first
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let candidate = after[..end].trim();
            if let Ok(value) = serde_json::from_str(candidate) {
                return Ok(value);
            }
        }
    }

    // Whole reply
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // First balanced object
    if let Some(start) = trimmed.find('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, c) in trimmed[start..].char_indices() {
            if in_string {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => in_string = false,
                    _ => escaped = false,
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &trimmed[start..start + offset + 1];
                        return serde_json::from_str(candidate)
                            .map_err(|e| CrewError::LlmParse(e.to_string()));
                    }
                }
                _ => {}
            }
        }
    }

    Err(CrewError::LlmParse(format!(
        "no JSON object found in reply: {}",
        &trimmed.chars().take(120).collect::<String>()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig {
            model_id: "gpt-4o-mini".into(),
            api_key: None,
            base_url: Some("https://openrouter.ai/api/v1/".into()),
            max_tokens: 512,
            temperature: 0.0,
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = ChatClient::new(config());
        assert_eq!(
            client.endpoint(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_chat_without_api_key_errors() {
        let client = ChatClient::new(config());
        let err = client.chat(&[ChatTurn::user("hi")]).await.unwrap_err();
        assert!(matches!(err, CrewError::LlmRequest(_)));
    }

    #[test]
    fn test_extract_json_plain() {
        let value = extract_json(r#"{"next_agent": "ba"}"#).unwrap();
        assert_eq!(value["next_agent"], "ba");
    }

    #[test]
    fn test_extract_json_fenced() {
        let raw = "Here you go:\n```json\n{\"next_agent\": \"dev\", \"reasoning\": \"x\"}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["next_agent"], "dev");
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let raw = "Sure. {\"a\": {\"b\": \"braces } in string\"}} trailing words";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["a"]["b"], "braces } in string");
    }

    #[test]
    fn test_extract_json_missing() {
        assert!(extract_json("no json here").is_err());
    }
}
