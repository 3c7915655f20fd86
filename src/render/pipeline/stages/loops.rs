//! Loop unrolling stage.

use async_trait::async_trait;
use serde_json::Value;

use crate::markup::{Node, Scoped, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::variables::{Binding, Scope};

/// Stage that unrolls `{FOREACH}` blocks.
///
/// Each element gets its own copy of the body, bound to the loop alias
/// (`item` by default). Later stages resolve the copies through that
/// binding. A source that is missing or not a list produces nothing.
pub struct LoopsStage;

#[async_trait]
impl Stage for LoopsStage {
    fn name(&self) -> &'static str {
        "loops"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut |node, scope| {
            let Node::Loop(l) = node else {
                return Ok::<_, PassError>(None);
            };
            let items = match scope.lookup_segments(&l.source) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            let count = items.len();
            let copies = items
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    Node::Scoped(Scoped {
                        binding: Binding {
                            name: l.alias.clone(),
                            value,
                            index,
                            count,
                        },
                        children: l.body.clone(),
                    })
                })
                .collect();
            Ok(Some(copies))
        })
    }
}
