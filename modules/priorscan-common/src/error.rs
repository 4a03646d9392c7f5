use thiserror::Error;

#[derive(Error, Debug)]
pub enum PriorScanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Memory store error: {0}")]
    Memory(String),
}
