//! External collaborators of a render.
//!
//! The renderer never reaches a network client or database on its own;
//! everything goes through these traits, injected when the renderer is
//! built. Implementations:
//!
//! - [`HttpImageFetcher`]: logo download with `reqwest`
//! - [`RestStore`]: signatures and attachments from the hosted database
//! - [`MemoryStore`]: records held in memory or loaded from a JSON file

mod images;
mod records;
mod rest;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;

pub use images::HttpImageFetcher;
pub use records::{AttachmentRecord, MemoryStore, SignatureRecord};
pub use rest::RestStore;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(u16),

    #[error("unsupported image URL '{0}'")]
    Unsupported(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid records: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read records file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads an image and returns it as a `data:` URI.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_data_uri(&self, url: &str) -> Result<String, FetchError>;
}

/// Signed signatures of a document, oldest first.
#[async_trait]
pub trait SignatureStore: Send + Sync {
    async fn signed_signatures(&self, document_id: &str)
    -> Result<Vec<SignatureRecord>, StoreError>;
}

/// Files attached to a document.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn attachments(
        &self,
        organization_id: &str,
        document_id: &str,
    ) -> Result<Vec<AttachmentRecord>, StoreError>;
}

/// The collaborators one renderer works with.
#[derive(Clone)]
pub struct Services {
    pub images: Arc<dyn ImageFetcher>,
    pub signatures: Arc<dyn SignatureStore>,
    pub attachments: Arc<dyn AttachmentStore>,
}

impl Services {
    /// Build the services described by the configuration.
    ///
    /// The hosted database is used when a `store` section is configured,
    /// otherwise records come from `records_file` (or nothing).
    pub fn from_config(config: &Config, records_file: Option<&Path>) -> Result<Self, ServiceError> {
        let images = Arc::new(HttpImageFetcher::new(&config.fetch)?);

        let services = match (&config.store, records_file) {
            (_, Some(path)) => {
                let store = Arc::new(MemoryStore::from_file(path)?);
                tracing::info!(path = %path.display(), "using records file");
                Self {
                    images,
                    signatures: store.clone(),
                    attachments: store,
                }
            }
            (Some(settings), None) => {
                let store = Arc::new(RestStore::new(settings, &config.fetch)?);
                tracing::info!(url = %settings.url, "using hosted database");
                Self {
                    images,
                    signatures: store.clone(),
                    attachments: store,
                }
            }
            (None, None) => {
                let store = Arc::new(MemoryStore::default());
                Self {
                    images,
                    signatures: store.clone(),
                    attachments: store,
                }
            }
        };
        Ok(services)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
