//! Signature zone stage.
//!
//! `<signature-field>` elements mark where a document gets signed:
//!
//! ```html
//! <signature-field id="sig-trainer" type="signature" label="Le formateur"
//!     signer-role="trainer" width="200" height="80" required="true" />
//! ```
//!
//! A zone becomes, in order of preference:
//! - the matching signed signature of the document (by role, then email)
//! - a value from the variables named after the zone id
//!   (`sig_trainer` or `signature_sig_trainer`)
//! - an empty dashed zone to be filled in

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;

use super::interpolate_text;
use crate::markup::{Attributes, Node, rewrite, visit};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::services::SignatureRecord;
use crate::util::{attr_escape, html_escape, html_unescape};
use crate::variables::Scope;

const MONTHS_FR: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

const LABEL_STYLE: &str = "font-size: 10pt; color: #666; margin: 0 0 5px 0;";
const SIGNED_BOX: &str = "border: 1px solid #10b981; border-radius: 4px; background-color: #f0fdf4; display: inline-block;";
const VARIABLE_BOX: &str = "border: 1px solid #3b82f6; border-radius: 4px; background-color: #eff6ff; display: inline-block;";
const EMPTY_BOX: &str = "border: 2px dashed #d1d5db; border-radius: 4px; background-color: #f9fafb;";

const SIGNATURE_ICON: &str = concat!(
    r##"<svg width="48" height="48" viewBox="0 0 24 24" fill="none" stroke="#9ca3af" stroke-width="1.5" style="opacity: 0.5;">"##,
    r#"<path d="M16 3.13a4 4 0 0 1 0 7.75" />"#,
    r#"<path d="M3 20.05V5.5a2.5 2.5 0 0 1 5 0V20.05" />"#,
    r#"<path d="M7 13.5h9.5" />"#,
    r#"<path d="M20 20.5V10.5a2.5 2.5 0 0 0-5 0V20.5" />"#,
    "</svg>"
);

/// Stage that fills `<signature-field>` zones.
///
/// Signatures are loaded once per render, only when a zone is present.
pub struct SignaturesStage;

#[async_trait]
impl Stage for SignaturesStage {
    fn name(&self) -> &'static str {
        "signatures"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        let vars = ctx.vars;

        let mut zones = 0;
        visit(&buffer.tree, &Scope::new(vars), &mut |node, _| {
            if matches!(node, Node::Signature(_)) {
                zones += 1;
            }
        });
        if zones == 0 {
            return Ok(());
        }

        let records = ctx.signatures(buffer.kind).await.to_vec();
        tracing::debug!(
            buffer = %buffer.kind,
            zones,
            signatures = records.len(),
            "filling signature zones"
        );

        rewrite(&mut buffer.tree, &Scope::new(vars), &mut |node, scope| {
            Ok::<_, PassError>(match node {
                Node::Signature(tag) => {
                    let field = SignatureField::from_attrs(&tag.attrs, scope);
                    Some(vec![Node::Html(field.render(&records, scope))])
                }
                _ => None,
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Signature,
    Initials,
    Date,
    Text,
}

#[derive(Debug)]
struct SignatureField {
    id: String,
    kind: FieldKind,
    /// Markup, placeholders resolved.
    label: Option<String>,
    /// The label as plain text, for `alt`.
    label_text: Option<String>,
    required: bool,
    signer_role: Option<String>,
    signer_email: Option<String>,
    width: u32,
    height: u32,
}

impl SignatureField {
    fn from_attrs(attrs: &Attributes, scope: &Scope<'_>) -> Self {
        let text = |name: &str| {
            attrs
                .get(name)
                .map(|v| interpolate_text(v, scope, false).trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let size = |name: &str, default: u32| {
            attrs
                .get(name)
                .and_then(|v| v.trim().trim_end_matches("px").parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        Self {
            id: text("id").unwrap_or_else(|| "signature".to_string()),
            kind: match attrs.get("type").map(str::trim) {
                Some("initials") => FieldKind::Initials,
                Some("date") => FieldKind::Date,
                Some("text") => FieldKind::Text,
                _ => FieldKind::Signature,
            },
            label: attrs
                .get("label")
                .map(|v| interpolate_text(v, scope, true))
                .filter(|v| !v.trim().is_empty()),
            label_text: attrs
                .get("label")
                .map(|v| interpolate_text(&html_unescape(v), scope, false).trim().to_string())
                .filter(|v| !v.is_empty()),
            required: attrs.get("required") == Some("true"),
            signer_role: text("signer-role"),
            signer_email: text("signer-email"),
            width: size("width", 200),
            height: size("height", 80),
        }
    }

    fn matches(&self, record: &SignatureRecord) -> bool {
        let role = self.signer_role.is_some() && record.signer_role == self.signer_role;
        let email = self.signer_email.is_some()
            && record
                .signer_email
                .as_deref()
                .zip(self.signer_email.as_deref())
                .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b));
        role || email
    }

    fn render(&self, records: &[SignatureRecord], scope: &Scope<'_>) -> String {
        if let Some(record) = records.iter().find(|r| self.matches(r)) {
            return self.signed(record);
        }
        if let Some(value) = self.variable_value(scope) {
            return self.from_variable(&value);
        }
        self.empty()
    }

    /// A signature given directly in the variables.
    fn variable_value(&self, scope: &Scope<'_>) -> Option<String> {
        let key = self.id.replace('-', "_");
        [key.clone(), format!("signature_{key}")]
            .iter()
            .find_map(|k| match scope.lookup(k) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
    }

    fn label_html(&self, with_required: bool) -> String {
        match &self.label {
            Some(label) => {
                let marker = if with_required && self.required {
                    r#" <span style="color: #ef4444;">*</span>"#
                } else {
                    ""
                };
                format!(r#"<p style="{LABEL_STYLE}">{label}{marker}</p>"#)
            }
            None => String::new(),
        }
    }

    fn wrap(&self, state: &str, extra_style: &str, label: String, body: String) -> String {
        format!(
            r#"<div class="signature-field {state}" style="display: inline-block; margin: 10px 0;{extra_style}">{label}{body}</div>"#
        )
    }

    fn signed(&self, record: &SignatureRecord) -> String {
        let label = self.label_html(false);
        let body = match self.kind {
            FieldKind::Date => format!(
                r#"<div style="{SIGNED_BOX} padding: 8px 12px;"><p style="margin: 0; font-size: 11pt; color: #047857; font-weight: 500;">{}</p></div>"#,
                record.signed_at.map(long_date).unwrap_or_default()
            ),
            FieldKind::Text if record.comment.as_deref().is_some_and(|c| !c.is_empty()) => format!(
                r#"<div style="{SIGNED_BOX} padding: 8px 12px; min-width: {}px;"><p style="margin: 0; font-size: 11pt; color: #047857;">{}</p></div>"#,
                self.width,
                html_escape(record.comment.as_deref().unwrap_or_default())
            ),
            _ => {
                let name = record
                    .signer_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("utilisateur");
                let date = record
                    .signed_at
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_default();
                format!(
                    concat!(
                        r#"<div style="{frame} padding: 8px;">"#,
                        r#"<img src="{src}" alt="Signature de {alt}" style="max-width: {w}px; max-height: {h}px; display: block;" />"#,
                        r#"<p style="margin: 8px 0 0 0; font-size: 9pt; color: #047857; text-align: center;">Signé par {name} le {date}</p>"#,
                        "</div>"
                    ),
                    frame = SIGNED_BOX,
                    src = attr_escape(record.signature_data.as_deref().unwrap_or_default()),
                    alt = attr_escape(name),
                    w = self.width,
                    h = self.height,
                    name = html_escape(name),
                    date = date,
                )
            }
        };
        self.wrap("signed", "", label, body)
    }

    fn from_variable(&self, value: &str) -> String {
        let label = self.label_html(false);
        let body = if value.starts_with("data:image") || value.starts_with("http") {
            format!(
                r#"<div style="{VARIABLE_BOX} padding: 8px;"><img src="{}" alt="{}" style="max-width: {}px; max-height: {}px; display: block;" /></div>"#,
                attr_escape(value),
                attr_escape(self.label_text.as_deref().unwrap_or("Signature")),
                self.width,
                self.height
            )
        } else {
            format!(
                r#"<div style="{VARIABLE_BOX} padding: 8px 12px; min-width: {}px;"><p style="margin: 0; font-size: 11pt; color: #1e40af;">{}</p></div>"#,
                self.width,
                html_escape(value)
            )
        };
        self.wrap("filled-from-variable", "", label, body)
    }

    fn empty(&self) -> String {
        let label = self.label_html(true);
        match self.kind {
            FieldKind::Date => self.wrap(
                "empty",
                "",
                label,
                format!(
                    r#"<div style="{EMPTY_BOX} padding: 8px 12px; display: inline-block; min-width: 150px;"><p style="margin: 0; font-size: 10pt; color: #9ca3af; text-align: center;">Date à remplir</p></div>"#
                ),
            ),
            FieldKind::Text => self.wrap(
                "empty",
                " width: 100%; max-width: 400px;",
                label,
                format!(
                    r#"<div style="{EMPTY_BOX} padding: 12px; min-height: 60px;"><p style="margin: 0; font-size: 10pt; color: #9ca3af;">Texte à remplir</p></div>"#
                ),
            ),
            FieldKind::Signature | FieldKind::Initials => {
                let mut body = format!(
                    r#"<div style="{EMPTY_BOX} padding: 12px; width: {}px; height: {}px; display: flex; align-items: center; justify-content: center;">{SIGNATURE_ICON}</div>"#,
                    self.width, self.height
                );
                if let Some(signer) = self.signer_role.as_deref().or(self.signer_email.as_deref()) {
                    body.push_str(&format!(
                        r#"<p style="margin: 5px 0 0 0; font-size: 9pt; color: #6b7280;">{}</p>"#,
                        html_escape(signer)
                    ));
                }
                self.wrap("empty", "", label, body)
            }
        }
    }
}

/// `1 mai 2024`
fn long_date(date: DateTime<Utc>) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTHS_FR[date.month0() as usize],
        date.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, serialize};
    use crate::render::RenderRequest;
    use crate::render::pipeline::BufferKind;
    use crate::render::test_support::Harness;
    use crate::services::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(role: &str) -> SignatureRecord {
        SignatureRecord {
            document_id: "doc-1".into(),
            signer_role: Some(role.into()),
            signer_email: Some("marie@of.fr".into()),
            signer_name: Some("Marie Curie".into()),
            signature_data: Some("data:image/png;base64,SIG".into()),
            signed_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            comment: Some("Lu et approuvé".into()),
            status: Some("signed".into()),
        }
    }

    async fn fill(harness: &Harness, src: &str) -> String {
        let mut ctx = harness.context();
        let mut buffer = Buffer::new(BufferKind::Content, parse(src).fragment);
        SignaturesStage.process(&mut buffer, &mut ctx).await.unwrap();
        serialize(&buffer.tree)
    }

    fn with_signatures(records: Vec<SignatureRecord>) -> Harness {
        Harness::new(json!({}))
            .with_store(MemoryStore {
                signatures: records,
                attachments: Vec::new(),
            })
            .with_request(RenderRequest {
                organization_id: None,
                document_id: Some("doc-1".into()),
            })
    }

    #[tokio::test]
    async fn test_signed_by_role() {
        let harness = with_signatures(vec![record("trainer")]);
        let html = fill(
            &harness,
            r#"<signature-field id="s1" label="Le formateur" signer-role="trainer" />"#,
        )
        .await;
        assert!(html.starts_with(r#"<div class="signature-field signed""#));
        assert!(html.contains(r#"<img src="data:image/png;base64,SIG" alt="Signature de Marie Curie""#));
        assert!(html.contains("Signé par Marie Curie le 01/05/2024"));
        assert!(html.contains("Le formateur"));
    }

    #[tokio::test]
    async fn test_signed_date_and_text() {
        let harness = with_signatures(vec![record("student")]);
        let html = fill(
            &harness,
            r#"<signature-field type="date" signer-email="MARIE@of.fr"></signature-field>"#,
        )
        .await;
        assert!(html.contains(">1 mai 2024</p>"));

        let html = fill(
            &harness,
            r#"<signature-field type="text" signer-role="student" />"#,
        )
        .await;
        assert!(html.contains(">Lu et approuvé</p>"));
    }

    #[tokio::test]
    async fn test_filled_from_variable() {
        let harness = Harness::new(json!({
            "sig_director": "data:image/png;base64,DIR",
            "signature_stamp": "Cachet de l'organisme"
        }));
        let html = fill(&harness, r#"<signature-field id="sig-director" />"#).await;
        assert!(html.contains("filled-from-variable"));
        assert!(html.contains(r#"src="data:image/png;base64,DIR""#));

        let html = fill(&harness, r#"<signature-field id="stamp" />"#).await;
        assert!(html.contains(">Cachet de l'organisme</p>"));
    }

    #[tokio::test]
    async fn test_variable_image_alt_is_escaped_once() {
        let harness = Harness::new(json!({
            "sig_director": "https://of.fr/sig.png",
            "service": "R&D"
        }));
        let html = fill(
            &harness,
            r#"<signature-field id="sig-director" label="Direction {service} &amp; co" />"#,
        )
        .await;
        assert!(html.contains(r#"alt="Direction R&amp;D &amp; co""#), "{html}");
        assert!(!html.contains("&amp;amp;"));
        assert!(html.contains(">Direction R&amp;D &amp; co</p>"));
    }

    #[tokio::test]
    async fn test_empty_zones() {
        let harness = Harness::new(json!({ "role": "stagiaire" }));
        let html = fill(
            &harness,
            r#"<signature-field id="x" label="Signature" required="true" signer-role="{role}" width="150" />"#,
        )
        .await;
        assert!(html.starts_with(r#"<div class="signature-field empty""#));
        assert!(html.contains(r#"Signature <span style="color: #ef4444;">*</span>"#));
        assert!(html.contains("width: 150px; height: 80px;"));
        assert!(html.contains("<svg"));
        assert!(html.contains(">stagiaire</p>"));

        assert!(fill(&harness, r#"<signature-field type="date" />"#).await.contains("Date à remplir"));
        assert!(fill(&harness, r#"<signature-field type="text" />"#).await.contains("Texte à remplir"));
    }

    #[tokio::test]
    async fn test_no_document_id_means_no_lookup() {
        let harness = Harness::new(json!({})).with_store(MemoryStore {
            signatures: vec![record("trainer")],
            attachments: Vec::new(),
        });
        let html = fill(&harness, r#"<signature-field signer-role="trainer" />"#).await;
        assert!(html.contains("signature-field empty"));
    }

    #[test]
    fn test_long_date() {
        let date = Utc.with_ymd_and_hms(2025, 8, 15, 0, 0, 0).unwrap();
        assert_eq!(long_date(date), "15 août 2025");
    }
}
