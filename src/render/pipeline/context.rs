//! Pipeline context for sharing state across stages.

use std::collections::HashMap;

use super::{BufferKind, RenderWarning};
use crate::config::{CodeSettings, RenderSettings};
use crate::render::RenderRequest;
use crate::services::{AttachmentRecord, Services, SignatureRecord};
use crate::variables::Variables;

/// Shared context for one render.
///
/// Holds the read-only inputs every stage needs, plus what stages load
/// lazily and share between buffers (fetched logos, signature and
/// attachment records) and the warnings collected along the way.
pub struct PipelineContext<'a> {
    // === Inputs ===
    /// Flattened variables of this render
    pub vars: &'a Variables,

    /// Identifiers used for record lookups
    pub request: &'a RenderRequest,

    // === Settings ===
    pub settings: &'a RenderSettings,
    pub codes: &'a CodeSettings,

    // === Services ===
    pub services: &'a Services,

    // === Per-render state ===
    /// Logo URL -> image source (data URI, or the URL itself after a failed fetch)
    pub logo_cache: HashMap<String, String>,

    signatures: Option<Vec<SignatureRecord>>,
    attachments: Option<Vec<AttachmentRecord>>,
    warnings: Vec<RenderWarning>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        vars: &'a Variables,
        request: &'a RenderRequest,
        settings: &'a RenderSettings,
        codes: &'a CodeSettings,
        services: &'a Services,
    ) -> Self {
        Self {
            vars,
            request,
            settings,
            codes,
            services,
            logo_cache: HashMap::new(),
            signatures: None,
            attachments: None,
            warnings: Vec::new(),
        }
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, stage: &str, buffer: BufferKind, message: impl Into<String>) {
        let warning = RenderWarning::new(stage, buffer, message);
        tracing::warn!(
            stage = %warning.stage,
            buffer = %warning.buffer,
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    pub fn into_warnings(self) -> Vec<RenderWarning> {
        self.warnings
    }

    /// Signed signatures of the requested document, loaded on first use.
    ///
    /// Without a document id there is nothing to look up. A store failure
    /// is recorded as a warning and read as "no signatures".
    pub async fn signatures(&mut self, buffer: BufferKind) -> &[SignatureRecord] {
        if self.signatures.is_none() {
            let (request, services) = (self.request, self.services);
            let records = match request.document_id.as_deref() {
                Some(document_id) => {
                    match services.signatures.signed_signatures(document_id).await {
                        Ok(records) => {
                            tracing::debug!(document_id, count = records.len(), "loaded signatures");
                            records
                        }
                        Err(e) => {
                            self.warn(
                                "signatures",
                                buffer,
                                format!("failed to load signatures: {e}"),
                            );
                            Vec::new()
                        }
                    }
                }
                None => Vec::new(),
            };
            self.signatures = Some(records);
        }
        self.signatures.as_deref().unwrap_or_default()
    }

    /// Attachments of the requested document, loaded on first use.
    ///
    /// Needs both an organization id and a document id.
    pub async fn attachments(&mut self, buffer: BufferKind) -> &[AttachmentRecord] {
        if self.attachments.is_none() {
            let (request, services) = (self.request, self.services);
            let ids = (
                request.organization_id.as_deref(),
                request.document_id.as_deref(),
            );
            let records = match ids {
                (Some(organization_id), Some(document_id)) => {
                    match services
                        .attachments
                        .attachments(organization_id, document_id)
                        .await
                    {
                        Ok(records) => {
                            tracing::debug!(document_id, count = records.len(), "loaded attachments");
                            records
                        }
                        Err(e) => {
                            self.warn(
                                "attachments",
                                buffer,
                                format!("failed to load attachments: {e}"),
                            );
                            Vec::new()
                        }
                    }
                }
                _ => Vec::new(),
            };
            self.attachments = Some(records);
        }
        self.attachments.as_deref().unwrap_or_default()
    }
}
