//! Template source to [`Fragment`].
//!
//! Scanning is a single forward pass over the source that recognises
//! `{...}` tokens and the handful of elements the render stages care about.
//! Everything else is copied through as HTML text. Block tokens are then
//! matched up into [`Conditional`] and [`Loop`] nodes.

use super::{
    Attributes, Calc, CodeImage, CodeKind, Conditional, Fragment, Link, LinkKind, Logo, Loop,
    Node, Placeholder, SpecialTag, TableSpec, Visibility, VisibilityRule,
};
use crate::expr::{self, Expr};
use crate::variables::{Segment, parse_path};

/// Longest `{...}` token considered. Longer brace runs are CSS or text.
const MAX_TOKEN_LEN: usize = 500;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Result of parsing one buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    pub fragment: Fragment,
    /// Constructs that were kept as literal text, with the reason.
    pub warnings: Vec<String>,
}

/// Parse template source into a tree.
pub fn parse(src: &str) -> Parsed {
    let mut lexer = Lexer::default();
    lexer.scan(src, true);
    lexer.flush();
    let Lexer {
        items,
        mut warnings,
        ..
    } = lexer;
    let fragment = build_tree(items, &mut warnings);
    Parsed { fragment, warnings }
}

// =============================================================================
// Flat items
// =============================================================================

#[derive(Debug)]
enum Item {
    Node(Node),
    If { condition: Expr, raw: String },
    Else { raw: String },
    EndIf { raw: String },
    Foreach { alias: String, source: Vec<Segment>, raw: String },
    EndForeach { raw: String },
}

/// What a `{...}` token turned out to be.
enum Token {
    Item(Item),
    /// Editor leftover, removed from the output.
    Drop,
    /// Not a template token; kept as text.
    Literal,
    /// Looked like a token but did not parse; kept as text.
    Invalid(String),
}

#[derive(Default)]
struct Lexer {
    items: Vec<Item>,
    text: String,
    warnings: Vec<String>,
}

impl Lexer {
    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.items
                .push(Item::Node(Node::Html(std::mem::take(&mut self.text))));
        }
    }

    fn emit(&mut self, item: Item) {
        self.flush();
        self.items.push(item);
    }

    /// Scan a source run. With `markup` set, elements are recognised too;
    /// otherwise the run is the inside of a tag and only braces count.
    fn scan(&mut self, src: &str, markup: bool) {
        let mut i = 0;
        let stops: &[char] = if markup { &['{', '<'] } else { &['{'] };

        while let Some(offset) = src[i..].find(stops) {
            let at = i + offset;
            self.text.push_str(&src[i..at]);

            i = if src[at..].starts_with('{') {
                self.brace(src, at, !markup)
            } else {
                self.angle(src, at)
            };
        }
        self.text.push_str(&src[i..]);
    }

    /// Handle a `{` at `at`; returns where scanning resumes.
    fn brace(&mut self, src: &str, at: usize, in_attr: bool) -> usize {
        let Some(end) = brace_end(src, at) else {
            self.text.push('{');
            return at + 1;
        };
        let raw = &src[at..end];
        let inner = &raw[1..raw.len() - 1];

        match classify(inner, raw, in_attr) {
            Token::Item(item) => self.emit(item),
            Token::Drop => {}
            Token::Literal => {
                // Rescan the inside, it may hold real tokens
                self.text.push('{');
                return at + 1;
            }
            Token::Invalid(reason) => {
                self.warnings.push(format!("{raw}: {reason}"));
                self.text.push_str(raw);
            }
        }
        end
    }

    /// Handle a `<` at `at`; returns where scanning resumes.
    fn angle(&mut self, src: &str, at: usize) -> usize {
        let rest = &src[at..];

        if let Some(body) = rest.strip_prefix("<!--") {
            // Placeholders in comments still resolve or get stripped
            self.text.push_str("<!--");
            return match body.find("-->") {
                Some(e) => {
                    self.scan(&body[..e], false);
                    self.text.push_str("-->");
                    at + 4 + e + 3
                }
                None => {
                    self.scan(body, false);
                    src.len()
                }
            };
        }

        let Some(tag) = parse_tag(src, at) else {
            self.text.push('<');
            return at + 1;
        };
        let raw = &src[at..tag.end];

        if tag.closing {
            self.text.push_str(raw);
            return tag.end;
        }

        match tag.name.as_str() {
            "img" if tag.attrs.has("data-logo-var") => {
                let key = tag
                    .attrs
                    .get("data-logo-var")
                    .unwrap_or_default()
                    .trim()
                    .trim_start_matches('{')
                    .trim_end_matches('}')
                    .trim()
                    .to_string();
                let special = SpecialTag {
                    attrs: tag.attrs,
                    raw: raw.to_string(),
                };
                self.emit(Item::Node(Node::Logo(Logo { key, tag: special })));
                return tag.end;
            }
            "img" if tag.attrs.has_class("qr-code-dynamic") || tag.attrs.has_class("barcode-dynamic") => {
                let kind = if tag.attrs.has_class("qr-code-dynamic") {
                    CodeKind::Qr
                } else {
                    CodeKind::Barcode
                };
                let special = SpecialTag {
                    attrs: tag.attrs,
                    raw: raw.to_string(),
                };
                self.emit(Item::Node(Node::Code(CodeImage { kind, tag: special })));
                return tag.end;
            }
            "signature-field" | "attachment-field" => {
                // Editors emit both `<x />` and `<x></x>`
                let close = format!("</{}>", tag.name);
                let mut end = tag.end;
                if !tag.self_closing && starts_with_ignore_case(&src[end..], &close) {
                    end += close.len();
                }
                let special = SpecialTag {
                    attrs: tag.attrs,
                    raw: src[at..end].to_string(),
                };
                let node = if tag.name == "signature-field" {
                    Node::Signature(special)
                } else {
                    Node::Attachment(special)
                };
                self.emit(Item::Node(node));
                return end;
            }
            _ => {}
        }

        if (tag.attrs.has("data-show-if") || tag.attrs.has("data-hide-if"))
            && let Some(end) = self.visibility(src, at, &tag)
        {
            return end;
        }

        self.scan(raw, false);
        tag.end
    }

    /// Try to turn an element with a visibility rule into a node.
    fn visibility(&mut self, src: &str, at: usize, tag: &RawTag) -> Option<usize> {
        let open_raw = &src[at..tag.end];
        let mut attrs = tag.attrs.clone();
        let show = attrs.remove("data-show-if");
        let hide = attrs.remove("data-hide-if");
        let (rule, source) = match (show, hide) {
            (Some(expr), _) => (VisibilityRule::ShowIf, expr),
            (None, Some(expr)) => (VisibilityRule::HideIf, expr),
            (None, None) => return None,
        };

        let condition = match expr::parse(&source) {
            Ok(condition) => condition,
            Err(e) => {
                self.warnings
                    .push(format!("{open_raw}: invalid visibility rule: {e}"));
                return None;
            }
        };

        let is_void = tag.self_closing || VOID_ELEMENTS.contains(&tag.name.as_str());
        let (inner, close, end) = if is_void {
            ("", String::new(), tag.end)
        } else {
            let Some((close_start, close_end)) = find_close(src, tag.end, &tag.name) else {
                self.warnings
                    .push(format!("{open_raw}: closing </{}> not found", tag.name));
                return None;
            };
            (
                &src[tag.end..close_start],
                src[close_start..close_end].to_string(),
                close_end,
            )
        };

        let end_marker = if tag.self_closing { " />" } else { ">" };
        let rebuilt = format!("<{}{}{end_marker}", tag.name, attrs.to_html());
        let open = parse_attr_run(&rebuilt, &mut self.warnings);

        let inner = parse(inner);
        self.warnings.extend(inner.warnings);

        self.emit(Item::Node(Node::Visibility(Visibility {
            rule,
            condition,
            open,
            children: inner.fragment,
            close,
            open_raw: open_raw.to_string(),
        })));
        Some(end)
    }
}

/// Tokenize the inside of a tag on its own.
fn parse_attr_run(src: &str, warnings: &mut Vec<String>) -> Fragment {
    let mut lexer = Lexer::default();
    lexer.scan(src, false);
    lexer.flush();
    warnings.append(&mut lexer.warnings);
    build_tree(lexer.items, warnings)
}

/// End (exclusive) of the `{...}` token starting at `at`.
///
/// In expression tokens (`IF`, function calls) quotes may contain `}`.
/// Anywhere else quotes are plain text. A nested `{`, or a run longer than
/// [`MAX_TOKEN_LEN`], means this is not a token.
fn brace_end(src: &str, at: usize) -> Option<usize> {
    let quoted = is_expression(&src[at + 1..]);
    let mut quote: Option<char> = None;
    for (offset, c) in src[at + 1..].char_indices() {
        if offset > MAX_TOKEN_LEN {
            return None;
        }
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if quoted => quote = Some(c),
            (None, '{') => return None,
            (None, '}') => return Some(at + 1 + offset + 1),
            _ => {}
        }
    }
    None
}

/// Whether a token body starts like `IF ...` or `NAME(...`.
fn is_expression(body: &str) -> bool {
    if body
        .strip_prefix("IF")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
    {
        return true;
    }
    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    name_len > 0 && body[name_len..].trim_start().starts_with('(')
}

fn classify(inner: &str, raw: &str, in_attr: bool) -> Token {
    if !inner.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Token::Literal;
    }
    let text = inner.trim();
    let raw = raw.to_string();

    match text {
        "ELSE" => return Token::Item(Item::Else { raw }),
        "ENDIF" => return Token::Item(Item::EndIf { raw }),
        "ENDFOREACH" => return Token::Item(Item::EndForeach { raw }),
        _ => {}
    }

    let (keyword, rest) = match text.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (text, ""),
    };

    match keyword {
        "IF" | "FOREACH" | "TABLE" if rest.is_empty() => return Token::Literal,
        "IF" => {
            return match expr::parse(rest) {
                Ok(condition) => Token::Item(Item::If { condition, raw }),
                Err(e) => Token::Invalid(format!("invalid condition: {e}")),
            };
        }
        "FOREACH" => return foreach(rest, raw),
        "TABLE" => return table(rest, raw),
        _ => {}
    }

    if let Some(kind) = LinkKind::from_keyword(keyword)
        && !rest.is_empty()
    {
        let (target, label) = match rest.split_once('|') {
            Some((t, l)) => (t.trim(), Some(l.trim().to_string()).filter(|l| !l.is_empty())),
            None => (rest, None),
        };
        return Token::Item(Item::Node(Node::Link(Link {
            kind,
            target: target.to_string(),
            label,
            raw,
        })));
    }

    if let Some((name, _)) = text.split_once('(')
        && expr::FUNCTIONS.contains(&name.trim())
        && text.ends_with(')')
    {
        return match expr::parse(text) {
            Ok(expr) => Token::Item(Item::Node(Node::Calc(Calc { expr, raw }))),
            Err(e) => Token::Invalid(format!("invalid calculation: {e}")),
        };
    }

    if let Some((left, _)) = text.split_once("&&")
        && parse_path(left.trim()).is_some()
    {
        return Token::Drop;
    }

    match parse_path(text) {
        Some(segments) => Token::Item(Item::Node(Node::Var(Placeholder {
            path: text.to_string(),
            segments,
            raw,
            in_attr,
        }))),
        None => Token::Literal,
    }
}

fn foreach(rest: &str, raw: String) -> Token {
    let (alias, list) = match rest.split_once(" IN ") {
        Some((alias, list)) => (alias.trim(), list.trim()),
        None => ("item", rest),
    };
    let alias_ok = matches!(parse_path(alias).as_deref(), Some([Segment::Key(_)]));
    match parse_path(list) {
        Some(source) if alias_ok => Token::Item(Item::Foreach {
            alias: alias.to_string(),
            source,
            raw,
        }),
        _ => Token::Invalid("invalid loop source".to_string()),
    }
}

fn table(rest: &str, raw: String) -> Token {
    let (source, spec) = match rest.split_once(':') {
        Some((source, spec)) => (source.trim(), spec),
        None => (rest, ""),
    };
    let Some(source) = parse_path(source) else {
        return Token::Invalid("invalid table source".to_string());
    };
    let columns = spec
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| match c.split_once('=') {
            Some((key, header)) => (key.trim().to_string(), header.trim().to_string()),
            None => (c.to_string(), c.to_string()),
        })
        .collect();
    Token::Item(Item::Node(Node::Table(TableSpec {
        source,
        columns,
        raw,
    })))
}

// =============================================================================
// Tags
// =============================================================================

#[derive(Debug, Clone)]
struct RawTag {
    name: String,
    attrs: Attributes,
    closing: bool,
    self_closing: bool,
    /// Byte offset just past `>`.
    end: usize,
}

/// Parse the tag starting at the `<` at `at`. `None` if it is not a tag.
fn parse_tag(src: &str, at: usize) -> Option<RawTag> {
    let bytes = src.as_bytes();
    let mut i = at + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    if !bytes.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-')
    {
        i += 1;
    }
    let name = src[name_start..i].to_ascii_lowercase();

    let mut attrs = Attributes::new();
    let mut self_closing = false;

    loop {
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                i += 1;
                break;
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                self_closing = true;
                i += 2;
                break;
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while bytes
            .get(i)
            .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
        {
            i += 1;
        }
        let attr_name = &src[attr_start..i];
        if attr_name.is_empty() {
            return None;
        }

        let mut j = i;
        while bytes.get(j).is_some_and(|b| b.is_ascii_whitespace()) {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            attrs.push(attr_name, None);
            continue;
        }
        j += 1;
        while bytes.get(j).is_some_and(|b| b.is_ascii_whitespace()) {
            j += 1;
        }

        let value = match bytes.get(j)? {
            q @ (b'"' | b'\'') => {
                let close = src[j + 1..].find(*q as char)? + j + 1;
                let value = &src[j + 1..close];
                i = close + 1;
                value
            }
            _ => {
                let start = j;
                while bytes
                    .get(j)
                    .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>')
                {
                    j += 1;
                }
                i = j;
                &src[start..j]
            }
        };
        attrs.push(attr_name, Some(value.to_string()));
    }

    Some(RawTag {
        name,
        attrs,
        closing,
        self_closing,
        end: i,
    })
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Find the close tag matching an element opened just before `from`,
/// counting nested elements of the same name.
fn find_close(src: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut i = from;

    while let Some(offset) = src[i..].find('<') {
        let at = i + offset;
        match parse_tag(src, at) {
            Some(tag) if tag.name == name && tag.closing => {
                if depth == 0 {
                    return Some((at, tag.end));
                }
                depth -= 1;
                i = tag.end;
            }
            Some(tag) => {
                if tag.name == name && !tag.self_closing {
                    depth += 1;
                }
                i = tag.end;
            }
            None => i = at + 1,
        }
    }
    None
}

// =============================================================================
// Block matching
// =============================================================================

enum Frame {
    If {
        condition: Expr,
        open_raw: String,
        then: Fragment,
        otherwise: Option<(String, Fragment)>,
    },
    Foreach {
        alias: String,
        source: Vec<Segment>,
        open_raw: String,
        body: Fragment,
    },
}

impl Frame {
    fn current(&mut self) -> &mut Fragment {
        match self {
            Frame::If {
                otherwise: Some((_, otherwise)),
                ..
            } => otherwise,
            Frame::If { then, .. } => then,
            Frame::Foreach { body, .. } => body,
        }
    }

    /// An unclosed block: its tokens go back to text, its body stays.
    fn flatten(self) -> Fragment {
        match self {
            Frame::If {
                open_raw,
                then,
                otherwise,
                ..
            } => {
                let mut out = vec![Node::Html(open_raw)];
                out.extend(then);
                if let Some((else_raw, otherwise)) = otherwise {
                    out.push(Node::Html(else_raw));
                    out.extend(otherwise);
                }
                out
            }
            Frame::Foreach { open_raw, body, .. } => {
                let mut out = vec![Node::Html(open_raw)];
                out.extend(body);
                out
            }
        }
    }
}

fn push(stack: &mut [Frame], root: &mut Fragment, node: Node) {
    let target = match stack.last_mut() {
        Some(frame) => frame.current(),
        None => root,
    };
    match (target.last_mut(), node) {
        (Some(Node::Html(prev)), Node::Html(next)) => prev.push_str(&next),
        (_, node) => target.push(node),
    }
}

fn build_tree(items: Vec<Item>, warnings: &mut Vec<String>) -> Fragment {
    let mut root = Fragment::new();
    let mut stack: Vec<Frame> = Vec::new();

    for item in items {
        match item {
            Item::Node(node) => push(&mut stack, &mut root, node),
            Item::If { condition, raw } => stack.push(Frame::If {
                condition,
                open_raw: raw,
                then: Vec::new(),
                otherwise: None,
            }),
            Item::Foreach { alias, source, raw } => stack.push(Frame::Foreach {
                alias,
                source,
                open_raw: raw,
                body: Vec::new(),
            }),
            Item::Else { raw } => match stack.last_mut() {
                Some(Frame::If { otherwise, .. }) if otherwise.is_none() => {
                    *otherwise = Some((raw, Vec::new()));
                }
                _ => push(&mut stack, &mut root, Node::Html(raw)),
            },
            Item::EndIf { raw } => match stack.pop() {
                Some(Frame::If {
                    condition,
                    open_raw,
                    then,
                    otherwise,
                }) => {
                    let (else_raw, otherwise) = match otherwise {
                        Some((r, o)) => (Some(r), Some(o)),
                        None => (None, None),
                    };
                    let node = Node::Conditional(Conditional {
                        condition,
                        then,
                        otherwise,
                        open_raw,
                        else_raw,
                        close_raw: raw,
                    });
                    push(&mut stack, &mut root, node);
                }
                other => {
                    stack.extend(other);
                    push(&mut stack, &mut root, Node::Html(raw));
                }
            },
            Item::EndForeach { raw } => match stack.pop() {
                Some(Frame::Foreach {
                    alias,
                    source,
                    open_raw,
                    body,
                }) => {
                    let node = Node::Loop(Loop {
                        alias,
                        source,
                        body,
                        open_raw,
                        close_raw: raw,
                    });
                    push(&mut stack, &mut root, node);
                }
                other => {
                    stack.extend(other);
                    push(&mut stack, &mut root, Node::Html(raw));
                }
            },
        }
    }

    while let Some(frame) = stack.pop() {
        let open = match &frame {
            Frame::If { open_raw, .. } | Frame::Foreach { open_raw, .. } => open_raw.clone(),
        };
        warnings.push(format!("{open}: block is never closed"));
        for node in frame.flatten() {
            push(&mut stack, &mut root, node);
        }
    }

    root
}
