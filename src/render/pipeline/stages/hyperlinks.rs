//! Dynamic hyperlink stage.

use async_trait::async_trait;

use crate::markup::{Fragment, Link, LinkKind, Node, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::util::{attr_escape, html_escape};
use crate::variables::Scope;

/// Stage that turns `{LINK}`, `{EMAIL}`, `{PHONE}` and `{SMS}` tokens into
/// anchors.
///
/// The target is a variable (`{EMAIL contact_email}`) or a literal that
/// reads as a URL, an email address or a phone number. The optional label
/// after `|` is resolved the same way and defaults to the target. A token
/// whose target resolves to nothing is removed.
pub struct HyperlinksStage;

#[async_trait]
impl Stage for HyperlinksStage {
    fn name(&self) -> &'static str {
        "hyperlinks"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut build)
    }
}

fn build(node: &Node, scope: &Scope<'_>) -> Result<Option<Fragment>, PassError> {
    let Node::Link(link) = node else {
        return Ok(None);
    };
    Ok(Some(anchor(link, scope).map(Node::Html).into_iter().collect()))
}

fn anchor(link: &Link, scope: &Scope<'_>) -> Option<String> {
    let target = resolve(&link.target, scope)
        .or_else(|| is_literal_target(&link.target).then(|| link.target.clone()))?;

    let href = match link.kind {
        LinkKind::Link if target.starts_with("www.") => format!("https://{target}"),
        LinkKind::Link => target.clone(),
        LinkKind::Email => format!("mailto:{target}"),
        LinkKind::Phone => format!("tel:{}", strip_spaces(&target)),
        LinkKind::Sms => format!("sms:{}", strip_spaces(&target)),
    };

    let label = link
        .label
        .as_deref()
        .map(|label| resolve(label, scope).unwrap_or_else(|| label.to_string()))
        .unwrap_or_else(|| target.clone());

    Some(format!(
        r#"<a href="{}">{}</a>"#,
        attr_escape(&href),
        html_escape(&label)
    ))
}

/// Non-empty display text of a variable.
fn resolve(path: &str, scope: &Scope<'_>) -> Option<String> {
    let text = scope.text(path);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn is_literal_target(text: &str) -> bool {
    let is_url = text.contains("://") || text.starts_with("www.");
    let is_email = text.contains('@') && !text.contains(char::is_whitespace);
    let is_phone = text
        .chars()
        .all(|c| c.is_ascii_digit() || " +-.()".contains(c))
        && text.chars().filter(char::is_ascii_digit).count() >= 6;
    is_url || is_email || is_phone
}

fn strip_spaces(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
