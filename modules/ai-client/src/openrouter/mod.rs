mod client;
pub(crate) mod types;

use client::OpenRouterClient;
use types::*;

use crate::error::{AiError, Provider, Result};

/// OpenRouter chat-completions client, used as the failover provider.
#[derive(Clone)]
pub struct OpenRouter {
    api_key: String,
    app_name: Option<String>,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_name: None,
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub(crate) fn client(&self) -> OpenRouterClient {
        let client = OpenRouterClient::new(&self.api_key);
        if let Some(ref name) = self.app_name {
            client.with_app_name(name)
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
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(WireMessage::system(system));
        }
        messages.push(WireMessage::user(user));

        let request = ChatRequest {
            model: model.to_string(),
            messages,
            max_tokens,
            temperature: Some(temperature),
        };

        let response = self.client().chat(&request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(AiError::Empty {
                provider: Provider::OpenRouter,
            })
    }
}
