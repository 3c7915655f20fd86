//! [`Fragment`] back to HTML.

use super::{Fragment, Node};

/// Serialize a tree. Nodes no stage consumed print their source text.
pub fn serialize(nodes: &Fragment) -> String {
    let mut out = String::new();
    write_nodes(nodes, &mut out);
    out
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        write_node(node, out);
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Html(html) => out.push_str(html),
        Node::Var(p) => out.push_str(&p.raw),
        Node::Logo(logo) => out.push_str(&logo.tag.raw),
        Node::Code(code) => out.push_str(&code.tag.raw),
        Node::Signature(tag) | Node::Attachment(tag) => out.push_str(&tag.raw),
        Node::Table(t) => out.push_str(&t.raw),
        Node::Calc(c) => out.push_str(&c.raw),
        Node::Link(l) => out.push_str(&l.raw),
        Node::Conditional(c) => {
            out.push_str(&c.open_raw);
            write_nodes(&c.then, out);
            if let (Some(else_raw), Some(otherwise)) = (&c.else_raw, &c.otherwise) {
                out.push_str(else_raw);
                write_nodes(otherwise, out);
            }
            out.push_str(&c.close_raw);
        }
        Node::Loop(l) => {
            out.push_str(&l.open_raw);
            write_nodes(&l.body, out);
            out.push_str(&l.close_raw);
        }
        Node::Visibility(v) => {
            out.push_str(&v.open_raw);
            write_nodes(&v.children, out);
            out.push_str(&v.close);
        }
        Node::Scoped(s) => write_nodes(&s.children, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse;

    #[test]
    fn test_unconsumed_constructs_round_trip() {
        let src = concat!(
            "<p>{IF a}x{ELSE}y{ENDIF}</p>",
            "{FOREACH items}<li>{item.label}</li>{ENDFOREACH}",
            "{TABLE items}{SUM(items.price)}{LINK site|Site}",
            r#"<div data-hide-if="b">z</div>"#,
            r#"<img data-logo-var="{ecole_logo}" />"#,
            r#"<signature-field id="s" />"#,
        );
        assert_eq!(serialize(&parse(src).fragment), src);
    }
}
