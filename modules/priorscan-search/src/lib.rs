pub mod cache;
pub mod error;
pub mod pacer;
pub mod patent;
pub mod retail;
pub mod retry;
pub mod web;

pub use cache::{CachedSearchResult, SearchCache};
pub use error::{Result, SearchError};
pub use pacer::RequestPacer;
pub use patent::PatentSearchClient;
pub use retail::RetailSearchClient;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use web::WebSearchClient;

use async_trait::async_trait;
use priorscan_common::{Channel, NoveltyFinding};

/// One search channel's client: takes the queries for a run, returns
/// normalized findings with no similarity scoring. Scoring is deferred to
/// the semantic analysis step, which is the only place that knows the
/// invention being compared against.
#[async_trait]
pub trait ChannelSearcher: Send + Sync {
    fn channel(&self) -> Channel;
    async fn search(&self, queries: &[String]) -> Result<Vec<NoveltyFinding>>;
}
