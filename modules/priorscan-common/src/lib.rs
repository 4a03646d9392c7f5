pub mod config;
pub mod error;
pub mod keywords;
pub mod types;

pub use config::Config;
pub use error::PriorScanError;
pub use types::*;
