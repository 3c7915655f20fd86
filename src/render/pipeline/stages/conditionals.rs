//! Conditional block stage.

use async_trait::async_trait;

use crate::markup::{Fragment, Node, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::variables::Scope;

/// Stage that resolves `{IF cond}...{ELSE}...{ENDIF}` blocks.
///
/// The chosen branch replaces the block; nested blocks are resolved in
/// turn. An evaluation error fails the pass for the whole buffer.
pub struct ConditionalsStage;

#[async_trait]
impl Stage for ConditionalsStage {
    fn name(&self) -> &'static str {
        "conditionals"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut resolve)
    }
}

/// Pick the branch of a conditional block.
fn resolve(node: &Node, scope: &Scope<'_>) -> Result<Option<Fragment>, PassError> {
    let Node::Conditional(c) = node else {
        return Ok(None);
    };
    let branch = if c.condition.test(scope)? {
        c.then.clone()
    } else {
        c.otherwise.clone().unwrap_or_default()
    };
    Ok(Some(branch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, serialize};
    use crate::render::pipeline::BufferKind;
    use crate::render::pipeline::stages::LoopsStage;
    use crate::render::test_support::Harness;
    use serde_json::{Value, json};

    async fn resolve(data: Value, src: &str) -> Result<String, PassError> {
        let harness = Harness::new(data);
        let mut ctx = harness.context();
        let mut buffer = Buffer::new(BufferKind::Content, parse(src).fragment);
        LoopsStage.process(&mut buffer, &mut ctx).await?;
        ConditionalsStage.process(&mut buffer, &mut ctx).await?;
        Ok(serialize(&buffer.tree))
    }

    #[tokio::test]
    async fn test_branches() {
        let src = "{IF total > 100}cher{ELSE}bon marché{ENDIF}";
        assert_eq!(resolve(json!({ "total": 150 }), src).await.unwrap(), "cher");
        assert_eq!(resolve(json!({ "total": "80" }), src).await.unwrap(), "bon marché");
        assert_eq!(
            resolve(json!({}), "a{IF missing}b{ENDIF}c").await.unwrap(),
            "ac"
        );
    }

    #[tokio::test]
    async fn test_nested_and_logical() {
        let src = "{IF a && !b}{IF c == \"x\"}1{ELSE}2{ENDIF}{ENDIF}";
        assert_eq!(
            resolve(json!({ "a": true, "b": false, "c": "x" }), src).await.unwrap(),
            "1"
        );
        assert_eq!(
            resolve(json!({ "a": true, "b": false, "c": "y" }), src).await.unwrap(),
            "2"
        );
        assert_eq!(resolve(json!({ "a": true, "b": true }), src).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_condition_on_loop_binding() {
        let src = "{FOREACH items}{IF item.paid}P{ELSE}-{ENDIF}{ENDFOREACH}";
        let data = json!({ "items": [{ "paid": true }, { "paid": false }, {}] });
        assert_eq!(resolve(data, src).await.unwrap(), "P--");
    }

    #[tokio::test]
    async fn test_evaluation_error_fails_the_pass() {
        let err = resolve(json!({ "a": 1 }), "{IF a / 0 > 1}x{ENDIF}").await.unwrap_err();
        assert!(matches!(err, PassError::Expr(_)));
    }

    #[tokio::test]
    async fn test_unmatched_keywords_survive() {
        assert_eq!(
            resolve(json!({}), "{ELSE} {ENDIF} {IF}").await.unwrap(),
            "{ELSE} {ENDIF} {IF}"
        );
    }
}
