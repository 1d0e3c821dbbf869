pub mod config;
pub mod error;
pub mod types;

pub use config::{ArchiveBackend, Config, TRACKED_HANDLES};
pub use error::ConfigError;
pub use types::*;
