//! Hosted database client (PostgREST interface).

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{AttachmentRecord, AttachmentStore, SignatureRecord, SignatureStore, StoreError};
use crate::config::{FetchSettings, StoreSettings};

/// Reads signatures and attachments through the database REST endpoint.
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    signatures_table: String,
    attachments_table: String,
}

impl RestStore {
    pub fn new(settings: &StoreSettings, fetch: &FetchSettings) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(fetch.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            signatures_table: settings.signatures_table.clone(),
            attachments_table: settings.attachments_table.clone(),
        })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = format!("{}/rest/v1/{table}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("select", "*")])
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let rows: Vec<T> = serde_json::from_str(&body)?;
        tracing::debug!(table, rows = rows.len(), "database select");
        Ok(rows)
    }
}

#[async_trait]
impl SignatureStore for RestStore {
    async fn signed_signatures(
        &self,
        document_id: &str,
    ) -> Result<Vec<SignatureRecord>, StoreError> {
        self.select(
            &self.signatures_table,
            &[
                ("document_id", format!("eq.{document_id}")),
                ("status", "eq.signed".to_string()),
                ("order", "signed_at.asc".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl AttachmentStore for RestStore {
    async fn attachments(
        &self,
        organization_id: &str,
        document_id: &str,
    ) -> Result<Vec<AttachmentRecord>, StoreError> {
        self.select(
            &self.attachments_table,
            &[
                ("document_id", format!("eq.{document_id}")),
                ("organization_id", format!("eq.{organization_id}")),
            ],
        )
        .await
    }
}
