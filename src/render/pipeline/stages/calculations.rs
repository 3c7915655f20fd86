//! Calculated variable stage.

use async_trait::async_trait;

use crate::expr::format_result;
use crate::markup::{Fragment, Node, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::util::html_escape;
use crate::variables::Scope;

/// Stage that evaluates `{SUM(items.price)}`, `{CALC(total * 1.2)}` and the
/// other calculated tokens.
pub struct CalculationsStage;

#[async_trait]
impl Stage for CalculationsStage {
    fn name(&self) -> &'static str {
        "calculations"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut evaluate)
    }
}

fn evaluate(node: &Node, scope: &Scope<'_>) -> Result<Option<Fragment>, PassError> {
    let Node::Calc(calc) = node else {
        return Ok(None);
    };
    let value = calc.expr.eval(scope)?;
    Ok(Some(vec![Node::Html(html_escape(&format_result(&value)))]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, serialize};
    use crate::render::pipeline::BufferKind;
    use crate::render::pipeline::stages::LoopsStage;
    use crate::render::test_support::Harness;
    use serde_json::{Value, json};

    async fn calc(data: Value, src: &str) -> Result<String, PassError> {
        let harness = Harness::new(data);
        let mut ctx = harness.context();
        let mut buffer = Buffer::new(BufferKind::Content, parse(src).fragment);
        LoopsStage.process(&mut buffer, &mut ctx).await?;
        CalculationsStage.process(&mut buffer, &mut ctx).await?;
        Ok(serialize(&buffer.tree))
    }

    #[tokio::test]
    async fn test_aggregates() {
        let data = json!({ "items": [{ "price": 100 }, { "price": "250,5" }, { "price": 49.5 }] });
        assert_eq!(
            calc(data, "{SUM(items.price)} / {AVERAGE(items.price)} / {COUNT(items)} / {MAX(items.price)}")
                .await
                .unwrap(),
            "400 / 133.33 / 3 / 250.5"
        );
    }

    #[tokio::test]
    async fn test_calc_expression() {
        let data = json!({ "hours": 35, "rate": 42.5 });
        assert_eq!(
            calc(data, "{CALC(hours * rate)} € HT, {ROUND(hours * rate * 1.2)} € TTC")
                .await
                .unwrap(),
            "1487.5 € HT, 1785 € TTC"
        );
    }

    #[tokio::test]
    async fn test_calc_per_loop_element() {
        let data = json!({ "lines": [{ "q": 2, "p": 10 }, { "q": 3, "p": 5 }] });
        assert_eq!(
            calc(data, "{FOREACH lines}{CALC(item.q * item.p)};{ENDFOREACH}")
                .await
                .unwrap(),
            "20;15;"
        );
    }

    #[tokio::test]
    async fn test_division_by_zero_is_an_error() {
        let err = calc(json!({ "a": 1 }), "{CALC(a / 0)}").await.unwrap_err();
        assert!(err.to_string().contains("expression error"));
    }
}
