//! Dynamic table stage.

use async_trait::async_trait;
use serde_json::Value;

use crate::markup::{Node, TableSpec, rewrite};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::util::html_escape;
use crate::variables::{Scope, display, parse_path, traverse};

/// Stage that expands `{TABLE list}` tokens into HTML tables.
///
/// Columns are the ones listed in the token (`{TABLE items: label=Module,
/// price=Prix}`), or the keys of the first row. A list of scalars gives a
/// single column. Cells are escaped.
pub struct TablesStage;

#[async_trait]
impl Stage for TablesStage {
    fn name(&self) -> &'static str {
        "tables"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        rewrite(&mut buffer.tree, &Scope::new(ctx.vars), &mut |node, scope| {
            Ok::<_, PassError>(match node {
                Node::Table(spec) => {
                    let html = match scope.lookup_segments(&spec.source) {
                        Some(Value::Array(rows)) => build_table(spec, &rows),
                        _ => String::new(),
                    };
                    Some(vec![Node::Html(html)])
                }
                _ => None,
            })
        })
    }
}

fn columns(spec: &TableSpec, rows: &[Value]) -> Vec<(String, String)> {
    if !spec.columns.is_empty() {
        return spec.columns.clone();
    }
    match rows.first() {
        Some(Value::Object(first)) => first.keys().map(|k| (k.clone(), k.clone())).collect(),
        _ => Vec::new(),
    }
}

fn cell(row: &Value, key: &str) -> String {
    parse_path(key)
        .and_then(|segments| traverse(row, &segments))
        .as_ref()
        .map(display)
        .unwrap_or_default()
}

fn build_table(spec: &TableSpec, rows: &[Value]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let columns = columns(spec, rows);

    let mut html = String::from(r#"<table class="dynamic-table"><thead><tr>"#);
    if columns.is_empty() {
        html.push_str("<th></th>");
    }
    for (_, header) in &columns {
        html.push_str(&format!("<th>{}</th>", html_escape(header)));
    }
    html.push_str("</tr></thead><tbody>");

    for row in rows {
        html.push_str("<tr>");
        match row {
            Value::Object(_) => {
                for (key, _) in &columns {
                    html.push_str(&format!("<td>{}</td>", html_escape(&cell(row, key))));
                }
            }
            scalar => {
                html.push_str(&format!("<td>{}</td>", html_escape(&display(scalar))));
            }
        }
        html.push_str("</tr>");
    }

    html.push_str("</tbody></table>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, serialize};
    use crate::render::pipeline::BufferKind;
    use crate::render::pipeline::stages::LoopsStage;
    use crate::render::test_support::Harness;
    use serde_json::json;

    async fn table(data: Value, src: &str) -> String {
        let harness = Harness::new(data);
        let mut ctx = harness.context();
        let mut buffer = Buffer::new(BufferKind::Content, parse(src).fragment);
        LoopsStage.process(&mut buffer, &mut ctx).await.unwrap();
        TablesStage.process(&mut buffer, &mut ctx).await.unwrap();
        serialize(&buffer.tree)
    }

    #[tokio::test]
    async fn test_explicit_columns() {
        let html = table(
            json!({ "items": [
                { "label": "Module <A>", "price": 100, "extra": "x" },
                { "label": "Module B", "price": 250.5 }
            ]}),
            "{TABLE items: label=Module, price=Prix}",
        )
        .await;
        assert_eq!(
            html,
            concat!(
                r#"<table class="dynamic-table"><thead><tr><th>Module</th><th>Prix</th></tr></thead><tbody>"#,
                "<tr><td>Module &lt;A&gt;</td><td>100</td></tr>",
                "<tr><td>Module B</td><td>250.5</td></tr>",
                "</tbody></table>"
            )
        );
    }

    #[tokio::test]
    async fn test_columns_from_first_row() {
        let html = table(
            json!({ "rows": [{ "b": 2, "a": 1 }, { "a": 3 }] }),
            "{TABLE rows}",
        )
        .await;
        // serde_json maps iterate in key order
        assert!(html.contains("<th>a</th><th>b</th>"));
        assert!(html.contains("<tr><td>3</td><td></td></tr>"));
    }

    #[tokio::test]
    async fn test_scalar_rows() {
        let html = table(json!({ "names": ["Marie", "Pierre"] }), "{TABLE names}").await;
        assert!(html.contains("<th></th>"));
        assert!(html.contains("<tr><td>Marie</td></tr><tr><td>Pierre</td></tr>"));
    }

    #[tokio::test]
    async fn test_missing_or_empty_source() {
        assert_eq!(table(json!({ "items": [] }), "a{TABLE items}b").await, "ab");
        assert_eq!(table(json!({ "items": 3 }), "a{TABLE items}b").await, "ab");
        assert_eq!(table(json!({}), "a{TABLE items}b").await, "ab");
    }

    #[tokio::test]
    async fn test_table_inside_loop_sees_binding() {
        let html = table(
            json!({ "groups": [{ "members": ["A"] }, { "members": ["B", "C"] }] }),
            "{FOREACH g IN groups}{TABLE g.members}{ENDFOREACH}",
        )
        .await;
        assert_eq!(html.matches("<table").count(), 2);
        assert!(html.contains("<td>C</td>"));
    }
}
