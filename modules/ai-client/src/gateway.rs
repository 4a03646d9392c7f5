//! Provider-failover completion gateway.
//!
//! Every model call in the pipeline goes through here so no caller has to
//! duplicate the fallback decision: Anthropic first, OpenRouter on errors
//! that indicate the primary is out of capacity or out of credit. Errors
//! that would fail identically on the secondary (malformed prompts, auth
//! rejection) propagate immediately.

use async_trait::async_trait;
use tracing::warn;

use crate::claude::Claude;
use crate::error::{AiError, Provider, Result};
use crate::openrouter::OpenRouter;

/// Default model for pipeline completions.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// OpenRouter model used when the requested Anthropic model has no entry in
/// the translation table.
const FALLBACK_DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// Anthropic model id → OpenRouter model id. Model availability and naming
/// are provider-specific facts, so this stays a finite table rather than a
/// runtime derivation.
const MODEL_FALLBACK_MAP: &[(&str, &str)] = &[
    ("claude-sonnet-4-20250514", "anthropic/claude-sonnet-4"),
    ("claude-haiku-4-5-20251001", "anthropic/claude-haiku-4.5"),
    ("claude-opus-4-1-20250805", "anthropic/claude-opus-4.1"),
    ("claude-3-5-haiku-20241022", "anthropic/claude-3.5-haiku"),
];

pub(crate) fn fallback_model(model: &str) -> &'static str {
    MODEL_FALLBACK_MAP
        .iter()
        .find(|(primary, _)| *primary == model)
        .map(|(_, secondary)| *secondary)
        .unwrap_or(FALLBACK_DEFAULT_MODEL)
}

/// Whether a primary-provider error should be retried on the secondary.
///
/// Triggers: credit/billing exhaustion, rate limiting, upstream overload,
/// and bad-request shapes that name the model as unavailable. Anything else
/// (auth failures, malformed prompts) would fail the same way on the
/// secondary provider, so it propagates as-is.
pub(crate) fn triggers_fallback(err: &AiError) -> bool {
    match err {
        AiError::Api {
            status, message, ..
        } => {
            let message = message.to_lowercase();
            match status {
                402 | 429 | 503 | 529 => true,
                400 => {
                    message.contains("model")
                        && (message.contains("not_found")
                            || message.contains("not found")
                            || message.contains("unavailable"))
                }
                _ => message.contains("credit") || message.contains("billing"),
            }
        }
        _ => false,
    }
}

/// What the gateway needs from a provider client. Both concrete clients
/// already speak this shape; the seam exists so failover routing can be
/// exercised without a live endpoint.
#[async_trait]
pub(crate) trait CompletionProvider: Send + Sync {
    async fn chat_completion(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

#[async_trait]
impl CompletionProvider for Claude {
    async fn chat_completion(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        Claude::chat_completion(self, model, system, user, max_tokens, temperature).await
    }
}

#[async_trait]
impl CompletionProvider for OpenRouter {
    async fn chat_completion(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        OpenRouter::chat_completion(self, model, system, user, max_tokens, temperature).await
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.0,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub provider: Provider,
    pub model: String,
}

pub struct CompletionGateway {
    primary: Option<Box<dyn CompletionProvider>>,
    secondary: Option<Box<dyn CompletionProvider>>,
}

impl CompletionGateway {
    pub fn new(anthropic_api_key: Option<&str>, openrouter_api_key: Option<&str>) -> Self {
        Self {
            primary: anthropic_api_key
                .map(|key| Box::new(Claude::new(key)) as Box<dyn CompletionProvider>),
            secondary: openrouter_api_key.map(|key| {
                Box::new(OpenRouter::new(key).with_app_name("priorscan"))
                    as Box<dyn CompletionProvider>
            }),
        }
    }

    #[cfg(test)]
    fn with_providers(
        primary: Option<Box<dyn CompletionProvider>>,
        secondary: Option<Box<dyn CompletionProvider>>,
    ) -> Self {
        Self { primary, secondary }
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        if let Some(ref primary) = self.primary {
            match primary
                .chat_completion(
                    &request.model,
                    request.system.as_deref(),
                    &request.prompt,
                    request.max_tokens,
                    request.temperature,
                )
                .await
            {
                Ok(text) => {
                    return Ok(Completion {
                        text,
                        provider: Provider::Anthropic,
                        model: request.model.clone(),
                    })
                }
                Err(err) if self.secondary.is_some() && triggers_fallback(&err) => {
                    warn!(error = %err, "Primary AI provider failed, falling back to OpenRouter");
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(ref secondary) = self.secondary {
            let model = fallback_model(&request.model);
            let text = secondary
                .chat_completion(
                    model,
                    request.system.as_deref(),
                    &request.prompt,
                    request.max_tokens,
                    request.temperature,
                )
                .await?;
            return Ok(Completion {
                text,
                provider: Provider::OpenRouter,
                model: model.to_string(),
            });
        }

        Err(AiError::NotConfigured {
            primary: "ANTHROPIC_API_KEY",
            secondary: "OPENROUTER_API_KEY",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn api_error(status: u16, message: &str) -> AiError {
        AiError::Api {
            provider: Provider::Anthropic,
            status,
            message: message.to_string(),
        }
    }

    /// Test provider that fails every call with a fixed error.
    struct FailingProvider {
        status: u16,
        message: &'static str,
    }

    impl FailingProvider {
        fn new(status: u16, message: &'static str) -> Self {
            Self { status, message }
        }
    }

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn chat_completion(
            &self,
            _model: &str,
            _system: Option<&str>,
            _user: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String> {
            Err(api_error(self.status, self.message))
        }
    }

    /// Test provider that succeeds and records the models it was asked
    /// for, through a handle the test keeps after boxing the provider.
    struct RecordingProvider {
        seen_models: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingProvider {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let seen_models = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    seen_models: seen_models.clone(),
                },
                seen_models,
            )
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        async fn chat_completion(
            &self,
            model: &str,
            _system: Option<&str>,
            _user: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String> {
            self.seen_models.lock().unwrap().push(model.to_string());
            Ok("fallback text".to_string())
        }
    }

    #[test]
    fn rate_limit_triggers_fallback() {
        assert!(triggers_fallback(&api_error(429, "rate_limit_error")));
    }

    #[test]
    fn overload_and_credit_exhaustion_trigger_fallback() {
        assert!(triggers_fallback(&api_error(529, "overloaded_error")));
        assert!(triggers_fallback(&api_error(503, "upstream unavailable")));
        assert!(triggers_fallback(&api_error(402, "payment required")));
        assert!(triggers_fallback(&api_error(
            500,
            "credit balance is too low"
        )));
    }

    #[test]
    fn model_unavailable_bad_request_triggers_fallback() {
        assert!(triggers_fallback(&api_error(
            400,
            "model: claude-sonnet-4-20250514 not_found"
        )));
    }

    #[test]
    fn malformed_prompt_propagates_immediately() {
        assert!(!triggers_fallback(&api_error(
            400,
            "messages: text content blocks must be non-empty"
        )));
        assert!(!triggers_fallback(&api_error(401, "invalid x-api-key")));
        assert!(!triggers_fallback(&AiError::Network("timeout".into())));
    }

    #[test]
    fn model_map_translates_known_models() {
        assert_eq!(
            fallback_model("claude-haiku-4-5-20251001"),
            "anthropic/claude-haiku-4.5"
        );
        assert_eq!(fallback_model("something-unknown"), FALLBACK_DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn rate_limited_primary_falls_back_with_translated_model() {
        let (secondary, seen_models) = RecordingProvider::new();
        let gateway = CompletionGateway::with_providers(
            Some(Box::new(FailingProvider::new(429, "rate_limit_error"))),
            Some(Box::new(secondary)),
        );

        let completion = gateway
            .complete(&CompletionRequest::new("hello").model("claude-haiku-4-5-20251001"))
            .await
            .expect("secondary should answer");

        assert_eq!(completion.provider, Provider::OpenRouter);
        assert_eq!(completion.model, "anthropic/claude-haiku-4.5");
        assert_eq!(completion.text, "fallback text");
        assert_eq!(
            *seen_models.lock().unwrap(),
            vec!["anthropic/claude-haiku-4.5".to_string()]
        );
    }

    #[tokio::test]
    async fn malformed_prompt_error_never_reaches_secondary() {
        let (secondary, seen_models) = RecordingProvider::new();
        let gateway = CompletionGateway::with_providers(
            Some(Box::new(FailingProvider::new(
                400,
                "messages: text content blocks must be non-empty",
            ))),
            Some(Box::new(secondary)),
        );

        let err = gateway
            .complete(&CompletionRequest::new("hello"))
            .await
            .expect_err("malformed prompt must propagate");

        assert!(matches!(err, AiError::Api { status: 400, .. }));
        assert!(seen_models.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn secondary_only_gateway_uses_translated_model_directly() {
        let (secondary, seen_models) = RecordingProvider::new();
        let gateway = CompletionGateway::with_providers(None, Some(Box::new(secondary)));

        let completion = gateway
            .complete(&CompletionRequest::new("hello"))
            .await
            .expect("secondary should answer");

        assert_eq!(completion.provider, Provider::OpenRouter);
        assert_eq!(completion.model, FALLBACK_DEFAULT_MODEL);
        assert_eq!(
            *seen_models.lock().unwrap(),
            vec![FALLBACK_DEFAULT_MODEL.to_string()]
        );
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_naming_both_credentials() {
        let gateway = CompletionGateway::new(None, None);
        assert!(!gateway.is_configured());

        let err = gateway
            .complete(&CompletionRequest::new("hello"))
            .await
            .expect_err("no providers configured");
        let text = err.to_string();
        assert!(text.contains("ANTHROPIC_API_KEY"));
        assert!(text.contains("OPENROUTER_API_KEY"));
    }
}
