//! Tree traversal shared by the render stages.

use super::{Fragment, Node};
use crate::variables::Scope;

/// Rewrite a fragment in place.
///
/// `f` sees every node with the scope it lives in. Returning `Some` replaces
/// the node (the replacement is rewritten in turn); `None` keeps it and
/// descends into its children. Loop copies push their binding on the way
/// down.
pub fn rewrite<E, F>(nodes: &mut Fragment, scope: &Scope<'_>, f: &mut F) -> Result<(), E>
where
    F: FnMut(&Node, &Scope<'_>) -> Result<Option<Fragment>, E>,
{
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in std::mem::take(nodes) {
        match f(&node, scope)? {
            Some(mut replacement) => {
                rewrite(&mut replacement, scope, f)?;
                out.extend(replacement);
            }
            None => {
                descend(&mut node, scope, f)?;
                out.push(node);
            }
        }
    }
    *nodes = out;
    Ok(())
}

fn descend<E, F>(node: &mut Node, scope: &Scope<'_>, f: &mut F) -> Result<(), E>
where
    F: FnMut(&Node, &Scope<'_>) -> Result<Option<Fragment>, E>,
{
    match node {
        Node::Scoped(s) => {
            let inner = scope.with(s.binding.clone());
            rewrite(&mut s.children, &inner, f)
        }
        Node::Conditional(c) => {
            rewrite(&mut c.then, scope, f)?;
            if let Some(otherwise) = &mut c.otherwise {
                rewrite(otherwise, scope, f)?;
            }
            Ok(())
        }
        Node::Loop(l) => rewrite(&mut l.body, scope, f),
        Node::Visibility(v) => {
            rewrite(&mut v.open, scope, f)?;
            rewrite(&mut v.children, scope, f)
        }
        _ => Ok(()),
    }
}

/// Visit every node, children included, with its scope.
pub fn visit<F>(nodes: &Fragment, scope: &Scope<'_>, f: &mut F)
where
    F: FnMut(&Node, &Scope<'_>),
{
    for node in nodes {
        f(node, scope);
        match node {
            Node::Scoped(s) => visit(&s.children, &scope.with(s.binding.clone()), f),
            Node::Conditional(c) => {
                visit(&c.then, scope, f);
                if let Some(otherwise) = &c.otherwise {
                    visit(otherwise, scope, f);
                }
            }
            Node::Loop(l) => visit(&l.body, scope, f),
            Node::Visibility(v) => {
                visit(&v.open, scope, f);
                visit(&v.children, scope, f);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{Scoped, parse, serialize};
    use crate::variables::{Binding, Variables};
    use serde_json::json;
    use std::convert::Infallible;

    #[test]
    fn test_rewrite_replaces_and_descends() {
        let vars = Variables::from_data(&json!({ "name": "Marie" }));
        let scope = Scope::new(&vars);
        let mut tree = parse("{IF a}<b>{name}</b>{ENDIF}").fragment;

        rewrite(&mut tree, &scope, &mut |node, scope| {
            Ok::<_, Infallible>(match node {
                Node::Var(p) => Some(vec![Node::Html(scope.text(&p.path))]),
                _ => None,
            })
        })
        .unwrap();

        assert_eq!(serialize(&tree), "{IF a}<b>Marie</b>{ENDIF}");
    }

    #[test]
    fn test_scoped_children_see_binding() {
        let vars = Variables::default();
        let scope = Scope::new(&vars);
        let mut tree = vec![Node::Scoped(Scoped {
            binding: Binding {
                name: "item".into(),
                value: json!({ "label": "A" }),
                index: 0,
                count: 1,
            },
            children: parse("{item.label}").fragment,
        })];

        let mut seen = Vec::new();
        visit(&tree, &scope, &mut |node, scope| {
            if let Node::Var(p) = node {
                seen.push(scope.text(&p.path));
            }
        });
        assert_eq!(seen, ["A"]);

        rewrite(&mut tree, &scope, &mut |node, _| {
            Ok::<_, Infallible>(match node {
                Node::Var(_) => Some(Vec::new()),
                _ => None,
            })
        })
        .unwrap();
        assert_eq!(serialize(&tree), "");
    }

    #[test]
    fn test_error_stops_rewrite() {
        let vars = Variables::default();
        let scope = Scope::new(&vars);
        let mut tree = parse("{a}{b}").fragment;
        let result = rewrite(&mut tree, &scope, &mut |node, _| match node {
            Node::Var(p) if p.path == "b" => Err("boom"),
            _ => Ok(None),
        });
        assert_eq!(result, Err("boom"));
    }
}
