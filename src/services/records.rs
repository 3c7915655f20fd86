//! Signature and attachment records, and the in-memory store.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AttachmentStore, SignatureStore, StoreError};

/// A row of the document signatures table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub signer_role: Option<String>,
    #[serde(default)]
    pub signer_email: Option<String>,
    #[serde(default)]
    pub signer_name: Option<String>,
    /// Image of the signature, usually a `data:image/png;base64,...` URI.
    #[serde(default)]
    pub signature_data: Option<String>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SignatureRecord {
    /// Records without a status are treated as signed.
    pub fn is_signed(&self) -> bool {
        self.status.as_deref().is_none_or(|s| s == "signed")
    }
}

/// A row of the document attachments table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Name of the `<attachment-field>` the file was uploaded for.
    pub field: String,
    #[serde(default)]
    pub file_name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl AttachmentRecord {
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }
}

/// Records held in memory.
///
/// Loaded from a JSON file shaped like
/// `{ "signatures": [...], "attachments": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub signatures: Vec<SignatureRecord>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
}

impl MemoryStore {
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl SignatureStore for MemoryStore {
    async fn signed_signatures(
        &self,
        document_id: &str,
    ) -> Result<Vec<SignatureRecord>, StoreError> {
        let mut records: Vec<_> = self
            .signatures
            .iter()
            .filter(|s| s.document_id == document_id && s.is_signed())
            .cloned()
            .collect();
        records.sort_by_key(|s| s.signed_at);
        Ok(records)
    }
}

#[async_trait]
impl AttachmentStore for MemoryStore {
    async fn attachments(
        &self,
        organization_id: &str,
        document_id: &str,
    ) -> Result<Vec<AttachmentRecord>, StoreError> {
        Ok(self
            .attachments
            .iter()
            .filter(|a| a.document_id == document_id)
            .filter(|a| a.organization_id.as_deref().is_none_or(|o| o == organization_id))
            .cloned()
            .collect())
    }
}
