//! QR code and barcode stage.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::interpolate_text;
use crate::config::CodeSettings;
use crate::markup::{CodeImage, CodeKind, Node, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::util::{attr_escape, html_unescape};
use crate::variables::Scope;

static MAX_WIDTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"max-width:\s*(\d+)px").expect("Invalid regex"));

const DEFAULT_QR_SIZE: u32 = 200;
const DEFAULT_BARCODE_TYPE: &str = "Code128";

/// Stage that points `<img class="qr-code-dynamic">` and
/// `<img class="barcode-dynamic">` at the code image services.
///
/// The data attribute is interpolated, written back, and encoded into the
/// image URL. Nothing is fetched here; the browser loads the image.
pub struct CodesStage;

#[async_trait]
impl Stage for CodesStage {
    fn name(&self) -> &'static str {
        "codes"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        let settings = ctx.codes;
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut |node, scope| {
            Ok::<_, PassError>(match node {
                Node::Code(code) => Some(vec![Node::Html(code_image(code, scope, settings))]),
                _ => None,
            })
        })
    }
}

fn code_image(code: &CodeImage, scope: &Scope<'_>, settings: &CodeSettings) -> String {
    let data_attr = match code.kind {
        CodeKind::Qr => "data-qr-data",
        CodeKind::Barcode => "data-barcode-data",
    };
    let mut tag = code.tag.clone();
    let template = html_unescape(tag.attrs.get(data_attr).unwrap_or_default());
    let data = interpolate_text(&template, scope, false);
    tag.attrs.set(data_attr, attr_escape(&data));

    if data.trim().is_empty() {
        tracing::debug!(attr = data_attr, "code image without data left as is");
        return tag.to_html("img");
    }

    let src = match code.kind {
        CodeKind::Qr => {
            let size = tag
                .attrs
                .get("style")
                .and_then(|style| MAX_WIDTH.captures(style))
                .and_then(|caps| caps[1].parse::<u32>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_QR_SIZE);
            format!(
                "{}?size={size}x{size}&data={}",
                settings.qr_base_url,
                urlencoding::encode(&data)
            )
        }
        CodeKind::Barcode => {
            let kind = tag
                .attrs
                .get("data-barcode-type")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_BARCODE_TYPE)
                .to_string();
            format!(
                "{}?data={}&code={}&dpi=96&dataseparator=",
                settings.barcode_base_url,
                urlencoding::encode(&data),
                urlencoding::encode(&kind)
            )
        }
    };
    tag.attrs.set("src", attr_escape(&src));
    tag.to_html("img")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, serialize};
    use crate::render::pipeline::BufferKind;
    use crate::render::pipeline::stages::LoopsStage;
    use crate::render::test_support::Harness;
    use serde_json::{Value, json};

    async fn codes(data: Value, src: &str) -> String {
        let harness = Harness::new(data);
        let mut ctx = harness.context();
        let mut buffer = Buffer::new(BufferKind::Content, parse(src).fragment);
        LoopsStage.process(&mut buffer, &mut ctx).await.unwrap();
        CodesStage.process(&mut buffer, &mut ctx).await.unwrap();
        serialize(&buffer.tree)
    }

    #[tokio::test]
    async fn test_qr_code() {
        let html = codes(
            json!({ "student": { "id": "S 42" } }),
            r#"<img class="qr-code-dynamic" data-qr-data="https://of.fr/check?s={student.id}&amp;v=1" style="max-width: 120px;" src="placeholder.png">"#,
        )
        .await;
        assert_eq!(
            html,
            concat!(
                r#"<img class="qr-code-dynamic" data-qr-data="https://of.fr/check?s=S 42&amp;v=1" style="max-width: 120px;" "#,
                r#"src="https://api.qrserver.com/v1/create-qr-code/?size=120x120&amp;data=https%3A%2F%2Fof.fr%2Fcheck%3Fs%3DS%2042%26v%3D1">"#
            )
        );
    }

    #[tokio::test]
    async fn test_barcode_defaults() {
        let html = codes(
            json!({ "ref": "INV-001" }),
            r#"<img class="barcode-dynamic" data-barcode-data="{ref}" />"#,
        )
        .await;
        assert_eq!(
            html,
            r#"<img class="barcode-dynamic" data-barcode-data="INV-001" src="https://barcode.tec-it.com/barcode.ashx?data=INV-001&amp;code=Code128&amp;dpi=96&amp;dataseparator=" />"#
        );
    }

    #[tokio::test]
    async fn test_qr_default_size_and_loop_binding() {
        let html = codes(
            json!({ "seats": ["A1", "B2"] }),
            r#"{FOREACH seats}<img class="qr-code-dynamic" data-qr-data="{item}">{ENDFOREACH}"#,
        )
        .await;
        assert!(html.contains("size=200x200&amp;data=A1"));
        assert!(html.contains("size=200x200&amp;data=B2"));
    }

    #[tokio::test]
    async fn test_missing_data_strips_placeholder() {
        let html = codes(
            json!({}),
            r#"<img class="qr-code-dynamic" data-qr-data="{missing}">"#,
        )
        .await;
        assert_eq!(html, r#"<img class="qr-code-dynamic" data-qr-data="">"#);
    }
}
