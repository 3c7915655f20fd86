//! Element visibility stage.

use async_trait::async_trait;

use crate::markup::{Fragment, Node, VisibilityRule, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::variables::Scope;

/// Stage that applies `data-show-if` / `data-hide-if` rules.
///
/// A kept element loses its rule attribute; a hidden one is removed with
/// its children.
pub struct VisibilityStage;

#[async_trait]
impl Stage for VisibilityStage {
    fn name(&self) -> &'static str {
        "visibility"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut apply)
    }
}

/// Keep or drop an element with a visibility rule.
fn apply(node: &Node, scope: &Scope<'_>) -> Result<Option<Fragment>, PassError> {
    let Node::Visibility(v) = node else {
        return Ok(None);
    };
    let holds = v.condition.test(scope)?;
    let keep = match v.rule {
        VisibilityRule::ShowIf => holds,
        VisibilityRule::HideIf => !holds,
    };
    if !keep {
        return Ok(Some(Vec::new()));
    }
    let mut element = v.open.clone();
    element.extend(v.children.iter().cloned());
    element.push(Node::Html(v.close.clone()));
    Ok(Some(element))
}
