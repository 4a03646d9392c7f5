mod client;
pub(crate) mod types;

use client::ClaudeClient;
use types::*;

use crate::error::{AiError, Provider, Result};

/// Anthropic Messages API completion client.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    base_url: Option<String>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub(crate) fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    pub async fn chat_completion(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let mut request = ChatRequest::new(model)
            .message(WireMessage::user(user))
            .max_tokens(max_tokens)
            .temperature(temperature);
        if let Some(system) = system {
            request = request.system(system);
        }

        let response = self.client().chat(&request).await?;

        response.text().ok_or(AiError::Empty {
            provider: Provider::Anthropic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_with_base_url() {
        let ai = Claude::new("sk-ant-test").with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
    }

    #[test]
    fn response_text_skips_non_text_blocks() {
        let json = r#"{"content":[{"type":"thinking","thinking":"hm"},{"type":"text","text":"hello"}]}"#;
        let response: ChatResponse = serde_json::from_str(json).expect("valid wire JSON");
        assert_eq!(response.text().as_deref(), Some("hello"));
    }
}
