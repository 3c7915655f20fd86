//! Configuration loading and types for formadoc.
//!
//! - Type definitions for config sections (`types`)
//! - Loading from `formadoc.yaml` and the environment (`load`)

mod load;
mod types;

pub use load::DEFAULT_CONFIG_FILE;
pub use types::{CodeSettings, Config, FetchSettings, RenderSettings, StoreSettings, WatchConfig};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("config path is not valid UTF-8: {0}")]
    EncodePath(std::path::PathBuf),

    #[error("{0}")]
    Validation(String),
}
