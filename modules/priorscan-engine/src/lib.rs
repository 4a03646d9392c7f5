pub mod agent;
pub mod aggregator;
pub mod expander;
pub mod memory;
pub mod model_output;

pub use agent::SearchAgent;
pub use aggregator::{NoveltyChecker, RunContext};
pub use expander::InventionExpander;
pub use memory::{InMemoryStore, MemoryStore};

use async_trait::async_trait;

/// Seam over the AI completion gateway so the pipeline can run against a
/// stub in tests. Production code uses [`ai_client::CompletionGateway`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn complete(
        &self,
        request: &ai_client::CompletionRequest,
    ) -> ai_client::Result<ai_client::Completion>;
}

#[async_trait]
impl CompletionBackend for ai_client::CompletionGateway {
    fn is_configured(&self) -> bool {
        ai_client::CompletionGateway::is_configured(self)
    }

    async fn complete(
        &self,
        request: &ai_client::CompletionRequest,
    ) -> ai_client::Result<ai_client::Completion> {
        ai_client::CompletionGateway::complete(self, request).await
    }
}
