use std::env;

/// Pipeline configuration loaded from environment variables.
///
/// Every provider credential is optional: a missing key demotes that channel
/// (or AI provider) to "not configured" rather than failing the whole
/// pipeline. The one hard requirement, enforced downstream, is at least one
/// AI provider.
#[derive(Debug, Clone, Default)]
pub struct Config {
    // AI providers
    pub anthropic_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,

    // Search providers
    pub serper_api_key: Option<String>,
    pub patentsview_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables. Empty values are
    /// treated as absent.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            openrouter_api_key: optional_env("OPENROUTER_API_KEY"),
            serper_api_key: optional_env("SERPER_API_KEY"),
            patentsview_api_key: optional_env("PATENTSVIEW_API_KEY"),
        }
    }

    pub fn has_ai_provider(&self) -> bool {
        self.anthropic_api_key.is_some() || self.openrouter_api_key.is_some()
    }

    /// Log which providers are present without echoing any key material.
    pub fn log_redacted(&self) {
        tracing::info!(
            anthropic = self.anthropic_api_key.is_some(),
            openrouter = self.openrouter_api_key.is_some(),
            serper = self.serper_api_key.is_some(),
            patentsview = self.patentsview_api_key.is_some(),
            "Provider configuration loaded"
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
