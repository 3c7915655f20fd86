//! Document markup tree.
//!
//! A header, content or footer buffer is parsed once into a [`Fragment`]:
//! plain HTML runs interleaved with the template constructs the render
//! stages know about (placeholders, blocks, tables, special elements).
//! Stages rewrite the tree and [`serialize`] turns it back into HTML.
//!
//! Constructs a stage did not consume serialize back to their source text,
//! so a failed stage leaves the buffer as written.

mod attributes;
mod lexer;
mod serialize;
mod walk;

use crate::expr::Expr;
use crate::variables::{Binding, Segment};

pub use attributes::Attributes;
pub use lexer::{Parsed, parse};
pub use serialize::serialize;
pub use walk::{rewrite, visit};

pub type Fragment = Vec<Node>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Markup passed through untouched.
    Html(String),
    /// `{key}` placeholder.
    Var(Placeholder),
    /// `<img data-logo-var="{key}">` marker.
    Logo(Logo),
    /// `<img class="qr-code-dynamic">` / `<img class="barcode-dynamic">`.
    Code(CodeImage),
    /// `<signature-field>` zone.
    Signature(SpecialTag),
    /// `<attachment-field>` link.
    Attachment(SpecialTag),
    /// `{IF}` ... `{ELSE}` ... `{ENDIF}`.
    Conditional(Conditional),
    /// `{FOREACH}` ... `{ENDFOREACH}`.
    Loop(Loop),
    /// `{TABLE list}`.
    Table(TableSpec),
    /// Element carrying `data-show-if` / `data-hide-if`.
    Visibility(Visibility),
    /// `{SUM(...)}`, `{CALC(...)}` and friends.
    Calc(Calc),
    /// `{LINK}`, `{EMAIL}`, `{PHONE}`, `{SMS}`.
    Link(Link),
    /// Loop body copy with its element bound.
    Scoped(Scoped),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub path: String,
    pub segments: Vec<Segment>,
    /// Source text, braces included.
    pub raw: String,
    /// Inside a tag, so values need attribute escaping.
    pub in_attr: bool,
}

/// An element the parser recognised, with its attributes and source text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialTag {
    pub attrs: Attributes,
    pub raw: String,
}

impl SpecialTag {
    /// Re-emit the element with (possibly edited) attributes.
    pub fn to_html(&self, name: &str) -> String {
        let end = if self.raw.trim_end().ends_with("/>") {
            " />"
        } else {
            ">"
        };
        format!("<{name}{}{end}", self.attrs.to_html())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    /// Variable named by the marker (`ecole_logo`...).
    pub key: String,
    pub tag: SpecialTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Qr,
    Barcode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeImage {
    pub kind: CodeKind,
    pub tag: SpecialTag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Expr,
    pub then: Fragment,
    pub otherwise: Option<Fragment>,
    pub open_raw: String,
    pub else_raw: Option<String>,
    pub close_raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    /// Name each element is bound to.
    pub alias: String,
    pub source: Vec<Segment>,
    pub body: Fragment,
    pub open_raw: String,
    pub close_raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub source: Vec<Segment>,
    /// `(key, header)` pairs. Empty means "use the first row's keys".
    pub columns: Vec<(String, String)>,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityRule {
    ShowIf,
    HideIf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Visibility {
    pub rule: VisibilityRule,
    pub condition: Expr,
    /// Opening tag with the rule attribute removed.
    pub open: Fragment,
    pub children: Fragment,
    pub close: String,
    pub open_raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calc {
    pub expr: Expr,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Link,
    Email,
    Phone,
    Sms,
}

impl LinkKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "LINK" => Some(LinkKind::Link),
            "EMAIL" => Some(LinkKind::Email),
            "PHONE" => Some(LinkKind::Phone),
            "SMS" => Some(LinkKind::Sms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub kind: LinkKind,
    pub target: String,
    pub label: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scoped {
    pub binding: Binding,
    pub children: Fragment,
}
