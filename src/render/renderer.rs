//! The document renderer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RenderRequest;
use super::defaults::{default_footer, default_header};
use super::page::{PageAssembler, PageParts, page_count};
use super::pipeline::stages::insert_logo_markers;
use super::pipeline::{Buffer, BufferKind, Pipeline, PipelineContext, RenderWarning};
use crate::config::{CodeSettings, Config, RenderSettings};
use crate::markup::{parse, serialize};
use crate::services::Services;
use crate::template::Template;
use crate::variables::Variables;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

/// A finished document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub html: String,
    /// Estimate from the content length, see [`page_count`].
    pub page_count: usize,
    pub warnings: Vec<RenderWarning>,
}

/// Renders templates into print-ready HTML.
///
/// Built once and shared between concurrent renders; everything a single
/// render accumulates lives in its own [`PipelineContext`].
pub struct DocumentRenderer {
    settings: RenderSettings,
    codes: CodeSettings,
    services: Services,
    pipeline: Pipeline,
    assembler: PageAssembler,
}

impl DocumentRenderer {
    pub fn new(config: &Config, services: Services) -> Result<Self, RenderError> {
        Ok(Self {
            settings: config.render.clone(),
            codes: config.codes.clone(),
            services,
            pipeline: Pipeline::default_pipeline(),
            assembler: PageAssembler::new()?,
        })
    }

    /// Render a template with the given variables.
    ///
    /// Stage failures and template syntax kept as text are reported in
    /// [`RenderedDocument::warnings`]; only page assembly can fail.
    pub async fn render(
        &self,
        template: &Template,
        data: &Value,
        request: &RenderRequest,
    ) -> Result<RenderedDocument, RenderError> {
        let vars = Variables::from_data(data);
        let result = self.render_with(template, &vars, request).await;

        if let Err(e) = &result {
            let keys: Vec<&str> = vars.keys().collect();
            tracing::error!(
                template_id = template.id.as_deref().unwrap_or("-"),
                template_type = template.kind.as_deref().unwrap_or("-"),
                variables = %keys.join(", "),
                error = %e,
                "document render failed"
            );
        }
        result
    }

    async fn render_with(
        &self,
        template: &Template,
        vars: &Variables,
        request: &RenderRequest,
    ) -> Result<RenderedDocument, RenderError> {
        let mut ctx =
            PipelineContext::new(vars, request, &self.settings, &self.codes, &self.services);

        let mut buffers = Vec::with_capacity(3);
        for (kind, source) in self.sources(template) {
            let marked = insert_logo_markers(&source, vars, &self.settings);
            let parsed = parse(&marked);
            for warning in parsed.warnings {
                ctx.warn("parse", kind, warning);
            }
            buffers.push(Buffer::new(kind, parsed.fragment));
        }

        self.pipeline.run(&mut buffers, &mut ctx).await;

        let mut header = None;
        let mut content = String::new();
        let mut footer = None;
        for buffer in &buffers {
            let html = serialize(&buffer.tree);
            match buffer.kind {
                BufferKind::Header => header = Some(html),
                BufferKind::Content => content = html,
                BufferKind::Footer => footer = Some(html).filter(|f| !f.trim().is_empty()),
            }
        }

        let html = self.assembler.assemble(
            template,
            &self.settings,
            &PageParts {
                header: header.as_deref(),
                content: &content,
                footer: footer.as_deref(),
            },
        )?;
        let page_count = page_count(&content, self.settings.chars_per_page);

        let warnings = ctx.into_warnings();
        tracing::debug!(
            template_id = template.id.as_deref().unwrap_or("-"),
            bytes = html.len(),
            page_count,
            warnings = warnings.len(),
            "document rendered"
        );

        Ok(RenderedDocument {
            html,
            page_count,
            warnings,
        })
    }

    /// Source of each present buffer. Enabled sections left empty get the
    /// default header or footer.
    fn sources(&self, template: &Template) -> Vec<(BufferKind, String)> {
        let mut sources = Vec::with_capacity(3);
        if template.header_enabled() {
            let header = template.header_html();
            let header = if header.trim().is_empty() {
                default_header()
            } else {
                header.to_string()
            };
            sources.push((BufferKind::Header, header));
        }
        sources.push((BufferKind::Content, template.content_html()));
        if template.footer_enabled() {
            let footer = template.footer_html();
            let footer = if footer.trim().is_empty() {
                default_footer()
            } else {
                footer.to_string()
            };
            sources.push((BufferKind::Footer, footer));
        }
        sources
    }
}
