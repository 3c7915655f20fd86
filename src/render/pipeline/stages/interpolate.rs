//! Variable interpolation stage.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::markup::{Fragment, Node, Placeholder, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::util::{attr_escape, html_escape};
use crate::variables::{Scope, display};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.\[\]]*)\}").expect("Invalid regex"));

/// Stage that substitutes the remaining `{key}` placeholders.
///
/// Values are resolved through loop bindings first, then the variable map.
/// Text is escaped for where the placeholder sits (element content or
/// attribute value), except for the configured raw HTML keys in content.
/// Placeholders that resolve to nothing are removed.
pub struct InterpolateStage;

#[async_trait]
impl Stage for InterpolateStage {
    fn name(&self) -> &'static str {
        "interpolate"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        let raw_keys = &ctx.settings.raw_html_keys;
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut |node, scope| {
            Ok::<_, PassError>(match node {
                Node::Var(p) => Some(substitute(p, scope, raw_keys)),
                _ => None,
            })
        })
    }
}

fn substitute(p: &Placeholder, scope: &Scope<'_>, raw_keys: &[String]) -> Fragment {
    let Some(value) = scope.lookup_segments(&p.segments) else {
        tracing::trace!(key = %p.path, "unresolved placeholder removed");
        return Vec::new();
    };
    let text = display(&value);
    if text.is_empty() {
        return Vec::new();
    }

    let html = if p.in_attr {
        attr_escape(&text)
    } else if raw_keys.iter().any(|k| *k == p.path) {
        text
    } else {
        html_escape(&text)
    };
    vec![Node::Html(html)]
}

/// Interpolate placeholders in plain text, such as attribute values read by
/// other stages. Unresolved placeholders are removed.
pub fn interpolate_text(text: &str, scope: &Scope<'_>, escape: bool) -> String {
    if !text.contains('{') {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let value = scope.text(&caps[1]);
            if escape { html_escape(&value) } else { value }
        })
        .into_owned()
}
