//! Append-only memory log seam.
//!
//! After a completed check the caller may opt into a durable record keyed
//! by (user, project), tagged with importance equal to the run's overall
//! novelty score. Persistence lives behind a trait so the web application
//! owns the real store; the in-process implementation covers the CLI and
//! tests.

use async_trait::async_trait;
use priorscan_common::{MemoryRecord, PriorScanError};

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn append(&self, record: MemoryRecord) -> Result<(), PriorScanError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    records: std::sync::RwLock<Vec<MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MemoryRecord> {
        self.records
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn append(&self, record: MemoryRecord) -> Result<(), PriorScanError> {
        self.records
            .write()
            .map_err(|e| PriorScanError::Memory(e.to_string()))?
            .push(record);
        Ok(())
    }
}
