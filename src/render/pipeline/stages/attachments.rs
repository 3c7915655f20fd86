//! Attachment link stage.

use async_trait::async_trait;

use crate::markup::{Attributes, Node, rewrite, visit};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::services::AttachmentRecord;
use crate::util::{attr_escape, html_escape};
use crate::variables::Scope;

/// Stage that replaces `<attachment-field name="cv" label="CV" />` with the
/// files uploaded for that field.
///
/// Each matching file becomes a link, or an inline image when
/// `display="image"` is set or the file is an image. A field without files
/// shows a "not available" note.
pub struct AttachmentsStage;

#[async_trait]
impl Stage for AttachmentsStage {
    fn name(&self) -> &'static str {
        "attachments"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        let vars = ctx.vars;

        let mut fields = 0;
        visit(&buffer.tree, &Scope::new(vars), &mut |node, _| {
            if matches!(node, Node::Attachment(_)) {
                fields += 1;
            }
        });
        if fields == 0 {
            return Ok(());
        }

        let records = ctx.attachments(buffer.kind).await.to_vec();

        rewrite(&mut buffer.tree, &Scope::new(vars), &mut |node, _| {
            Ok::<_, PassError>(match node {
                Node::Attachment(tag) => Some(vec![Node::Html(render_field(&tag.attrs, &records))]),
                _ => None,
            })
        })
    }
}

fn render_field(attrs: &Attributes, records: &[AttachmentRecord]) -> String {
    let name = attrs.get("name").map(str::trim).unwrap_or_default();
    let label = attrs
        .get("label")
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(name);
    let as_image = attrs.get("display").map(str::trim) == Some("image");

    let files: Vec<_> = records
        .iter()
        .filter(|r| !name.is_empty() && r.field == name)
        .collect();

    if files.is_empty() {
        return format!(
            r#"<span class="attachment-missing">{}: non disponible</span>"#,
            html_escape(label)
        );
    }

    let items: String = files
        .iter()
        .map(|file| {
            let text = file
                .file_name
                .as_deref()
                .filter(|n| !n.is_empty())
                .unwrap_or(label);
            if as_image || file.is_image() {
                format!(
                    r#"<img class="attachment-image" src="{}" alt="{}" style="max-width: 100%;" />"#,
                    attr_escape(&file.url),
                    attr_escape(text)
                )
            } else {
                format!(
                    r#"<a class="attachment-link" href="{}" target="_blank">{}</a>"#,
                    attr_escape(&file.url),
                    html_escape(text)
                )
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    format!(r#"<span class="attachment-field">{items}</span>"#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, serialize};
    use crate::render::RenderRequest;
    use crate::render::pipeline::BufferKind;
    use crate::render::test_support::Harness;
    use crate::services::MemoryStore;
    use serde_json::json;

    fn harness(document_id: Option<&str>) -> Harness {
        Harness::new(json!({}))
            .with_store(MemoryStore {
                signatures: Vec::new(),
                attachments: vec![
                    AttachmentRecord {
                        document_id: "doc-1".into(),
                        organization_id: Some("org-1".into()),
                        field: "cv".into(),
                        file_name: Some("cv-marie.pdf".into()),
                        url: "https://files/cv.pdf?a=1&b=2".into(),
                        mime_type: Some("application/pdf".into()),
                    },
                    AttachmentRecord {
                        document_id: "doc-1".into(),
                        organization_id: None,
                        field: "photo".into(),
                        file_name: None,
                        url: "https://files/p.jpg".into(),
                        mime_type: Some("image/jpeg".into()),
                    },
                ],
            })
            .with_request(RenderRequest {
                organization_id: Some("org-1".into()),
                document_id: document_id.map(str::to_string),
            })
    }

    async fn fill(harness: &Harness, src: &str) -> String {
        let mut ctx = harness.context();
        let mut buffer = Buffer::new(BufferKind::Content, parse(src).fragment);
        AttachmentsStage.process(&mut buffer, &mut ctx).await.unwrap();
        serialize(&buffer.tree)
    }

    #[tokio::test]
    async fn test_link_and_image() {
        let harness = harness(Some("doc-1"));
        assert_eq!(
            fill(&harness, r#"<attachment-field name="cv" label="CV" />"#).await,
            r#"<span class="attachment-field"><a class="attachment-link" href="https://files/cv.pdf?a=1&amp;b=2" target="_blank">cv-marie.pdf</a></span>"#
        );
        assert_eq!(
            fill(&harness, r#"<attachment-field name="photo" label="Photo"></attachment-field>"#).await,
            r#"<span class="attachment-field"><img class="attachment-image" src="https://files/p.jpg" alt="Photo" style="max-width: 100%;" /></span>"#
        );
    }

    #[tokio::test]
    async fn test_missing_attachment() {
        let harness = harness(Some("doc-1"));
        assert_eq!(
            fill(&harness, r#"<attachment-field name="diploma" label="Diplôme" />"#).await,
            r#"<span class="attachment-missing">Diplôme: non disponible</span>"#
        );
    }

    #[tokio::test]
    async fn test_without_document_nothing_is_available() {
        let harness = harness(None);
        assert!(
            fill(&harness, r#"<attachment-field name="cv" />"#)
                .await
                .contains("cv: non disponible")
        );
    }
}
