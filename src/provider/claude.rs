use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::types::*;

const API_URL: &str = "https://api.anthropic.com/v1/messages";

pub struct ClaudeProvider {
    client: Client,
    model: String,
}

impl ClaudeProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    pub async fn chat(&self, messages: &[Message], api_key: &str) -> Result<LlmResponse, ProviderError> {
        let body = build_request_body(&self.model, messages);

        debug!("Claude API request: model={}", self.model);

        let resp = self
            .client
            .post(API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestError(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthError("Invalid API key".into()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::RequestError(format!("HTTP {status}: {text}")));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        parse_response(&body)
    }
}

/// Claude keeps the system prompt outside the message list.
fn build_request_body(model: &str, messages: &[Message]) -> serde_json::Value {
    let mut system_prompt = String::new();
    let mut api_messages: Vec<serde_json::Value> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                if !system_prompt.is_empty() {
                    system_prompt.push_str("\n\n");
                }
                system_prompt.push_str(&msg.content);
            }
            Role::User | Role::Assistant => api_messages.push(json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            })),
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": 1024,
        "messages": api_messages,
    });

    if !system_prompt.is_empty() {
        // Content block with cache_control so the prompt prefix is cached
        body["system"] = json!([{
            "type": "text",
            "text": system_prompt,
            "cache_control": { "type": "ephemeral" }
        }]);
    }

    body
}

fn parse_response(body: &serde_json::Value) -> Result<LlmResponse, ProviderError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| ProviderError::ParseError("missing content array".into()))?;

    let text_parts: Vec<&str> = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();

    let usage = Usage {
        prompt_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        cache_creation_tokens: body["usage"]["cache_creation_input_tokens"].as_u64().unwrap_or(0) as u32,
        cache_read_tokens: body["usage"]["cache_read_input_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(LlmResponse {
        content: text_parts.join("\n"),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_move_to_system_field() {
        let messages = vec![
            Message::new(Role::System, "be nice"),
            Message::new(Role::User, "hi"),
            Message::new(Role::Assistant, "hello"),
            Message::new(Role::User, "menu?"),
        ];
        let body = build_request_body("m", &messages);
        assert_eq!(body["system"][0]["text"], "be nice");
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(msgs[2]["content"], "menu?");
    }

    #[test]
    fn no_system_field_without_system_message() {
        let body = build_request_body("m", &[Message::new(Role::User, "hi")]);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn parses_text_blocks_and_usage() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Pho is great."},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Want one?"}
            ],
            "usage": {"input_tokens": 120, "output_tokens": 9, "cache_read_input_tokens": 100}
        });
        let resp = parse_response(&body).unwrap();
        assert_eq!(resp.content, "Pho is great.\nWant one?");
        assert_eq!(resp.usage.prompt_tokens, 120);
        assert_eq!(resp.usage.cache_read_tokens, 100);
        assert_eq!(resp.usage.cache_creation_tokens, 0);
    }

    #[test]
    fn missing_content_is_parse_error() {
        assert!(matches!(
            parse_response(&json!({"error": "x"})),
            Err(ProviderError::ParseError(_))
        ));
    }
}
