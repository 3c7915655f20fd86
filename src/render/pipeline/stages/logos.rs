//! Logo resolution.
//!
//! Logos reach the tree as `<img data-logo-var="{key}">` markers. Markers
//! come from the template itself or from [`insert_logo_markers`], which
//! runs on the raw buffer text before parsing. The stage then swaps each
//! marker for a real image, inlined as a data URI when it can be fetched.

use async_trait::async_trait;

use crate::config::RenderSettings;
use crate::markup::{Attributes, Logo, Node, rewrite, visit};
use crate::render::pipeline::{Buffer, PassError, PipelineContext, Stage};
use crate::util::attr_escape;
use crate::variables::{Scope, Variables};

const LOGO_STYLE: &str = "max-height: 55px; max-width: 140px; object-fit: contain;";

// =============================================================================
// Marker insertion
// =============================================================================

fn marker(key: &str) -> String {
    format!(r#"<img alt="Logo" style="{LOGO_STYLE}" data-logo-var="{{{key}}}" />"#)
}

/// Whether `pos` falls inside a tag, i.e. after a `<` that is not closed yet.
fn inside_tag(html: &str, pos: usize) -> bool {
    let before = &html[..pos];
    match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

fn replace_outside_tags(html: &str, needle: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for (pos, _) in html.match_indices(needle) {
        if inside_tag(html, pos) {
            continue;
        }
        out.push_str(&html[last..pos]);
        out.push_str(replacement);
        last = pos + needle.len();
    }
    out.push_str(&html[last..]);
    out
}

/// Turn logo placeholders and bare storage URLs into logo markers.
///
/// `{ecole_logo}` in text becomes a marker when the variable has a value and
/// disappears when it is empty. A logo URL on one of the storage hosts that
/// appears as plain text (not inside a tag) becomes a marker as well.
/// Placeholders inside tags (`src="{ecole_logo}"`) are left to interpolation.
pub fn insert_logo_markers(html: &str, vars: &Variables, settings: &RenderSettings) -> String {
    let mut html = html.to_string();

    for key in &settings.logo_keys {
        let token = format!("{{{key}}}");
        let value = vars.text(key);
        let value = value.trim();

        if html.contains(&token) {
            let replacement = if value.is_empty() {
                String::new()
            } else {
                marker(key)
            };
            html = replace_outside_tags(&html, &token, &replacement);
        }

        let on_storage = settings
            .storage_hosts
            .iter()
            .any(|host| !host.is_empty() && value.contains(host.as_str()));
        if on_storage && html.contains(value) {
            html = replace_outside_tags(&html, value, &marker(key));
        }
    }

    html
}

// =============================================================================
// Stage
// =============================================================================

/// Stage that resolves logo markers into images.
///
/// `http(s)` logos are fetched once per render and inlined as data URIs.
/// A failed fetch keeps the original URL so the browser can still try.
pub struct LogosStage;

#[async_trait]
impl Stage for LogosStage {
    fn name(&self) -> &'static str {
        "logos"
    }

    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError> {
        let vars = ctx.vars;

        let mut urls = Vec::new();
        visit(&buffer.tree, &Scope::new(vars), &mut |node, scope| {
            if let Node::Logo(logo) = node {
                let value = scope.text(&logo.key);
                let value = value.trim();
                if is_remote(value) && !urls.iter().any(|u| u == value) {
                    urls.push(value.to_string());
                }
            }
        });

        for url in urls {
            if ctx.logo_cache.contains_key(&url) {
                continue;
            }
            let resolved = match ctx.services.images.fetch_data_uri(&url).await {
                Ok(data_uri) => {
                    tracing::debug!(url = %url, bytes = data_uri.len(), "logo inlined");
                    data_uri
                }
                Err(e) => {
                    ctx.warn(
                        self.name(),
                        buffer.kind,
                        format!("failed to fetch logo {url}: {e}"),
                    );
                    url.clone()
                }
            };
            ctx.logo_cache.insert(url, resolved);
        }

        let cache = &ctx.logo_cache;
        rewrite(&mut buffer.tree, &Scope::new(vars), &mut |node, scope| {
            Ok::<_, PassError>(match node {
                Node::Logo(logo) => {
                    let value = scope.text(&logo.key);
                    let value = value.trim();
                    let src = cache.get(value).map(String::as_str).unwrap_or(value);
                    Some(vec![Node::Html(logo_image(logo, src))])
                }
                _ => None,
            })
        })
    }
}

fn is_remote(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// `<img src alt ... style />` from a marker, keeping its other attributes.
fn logo_image(logo: &Logo, src: &str) -> String {
    let marker = &logo.tag.attrs;
    let mut attrs = Attributes::new();
    attrs.push("src", Some(attr_escape(src)));
    attrs.push(
        "alt",
        Some(marker.get("alt").unwrap_or("Logo").to_string()),
    );
    for (name, value) in marker.iter() {
        let skip = ["src", "alt", "style", "data-logo-var"]
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name));
        if !skip {
            attrs.push(name, value.map(str::to_string));
        }
    }

    let style = if src.is_empty() {
        "display: none;".to_string()
    } else {
        marker.get("style").unwrap_or(LOGO_STYLE).to_string()
    };
    attrs.push("style", Some(style));

    format!("<img{} />", attrs.to_html())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodeSettings;
    use crate::markup::{parse, serialize};
    use crate::render::RenderRequest;
    use crate::render::pipeline::BufferKind;
    use crate::render::test_support::{StubFetcher, services_with};
    use serde_json::json;
    use std::sync::Arc;

    fn settings() -> RenderSettings {
        RenderSettings::default()
    }

    #[test]
    fn test_marker_insertion() {
        let vars = Variables::from_data(&json!({ "ecole_logo": "https://x.supabase.co/logo.png" }));
        let out = insert_logo_markers("<div>{ecole_logo}</div>", &vars, &settings());
        assert_eq!(
            out,
            r#"<div><img alt="Logo" style="max-height: 55px; max-width: 140px; object-fit: contain;" data-logo-var="{ecole_logo}" /></div>"#
        );
    }

    #[test]
    fn test_empty_logo_is_dropped() {
        let vars = Variables::from_data(&json!({ "ecole_logo": "" }));
        let out = insert_logo_markers("<p>{ecole_logo}{organization_logo}</p>", &vars, &settings());
        assert_eq!(out, "<p></p>");
    }

    #[test]
    fn test_placeholder_inside_tag_is_kept() {
        let vars = Variables::from_data(&json!({ "ecole_logo": "https://x.supabase.co/l.png" }));
        let src = r#"<img src="{ecole_logo}">"#;
        assert_eq!(insert_logo_markers(src, &vars, &settings()), src);
    }

    #[test]
    fn test_bare_storage_url_becomes_marker() {
        let url = "https://x.supabase.co/storage/logo.png";
        let vars = Variables::from_data(&json!({ "organization_logo": url }));
        let src = format!(r#"<p>{url}</p><a href="{url}">lien</a>"#);
        let out = insert_logo_markers(&src, &vars, &settings());
        assert!(out.starts_with(r#"<p><img alt="Logo""#));
        assert!(out.contains(r#"data-logo-var="{organization_logo}""#));
        assert!(out.contains(&format!(r#"<a href="{url}">"#)));
    }

    #[test]
    fn test_url_off_storage_is_not_touched() {
        let url = "https://cdn.example.com/logo.png";
        let vars = Variables::from_data(&json!({ "ecole_logo": url }));
        let src = format!("<p>{url}</p>");
        assert_eq!(insert_logo_markers(&src, &vars, &settings()), src);
    }

    async fn run(data: serde_json::Value, fetcher: StubFetcher, src: &str) -> (String, usize, usize) {
        let vars = Variables::from_data(&data);
        let request = RenderRequest::default();
        let settings = settings();
        let codes = CodeSettings::default();
        let fetcher = Arc::new(fetcher);
        let services = services_with(fetcher.clone());
        let mut ctx = PipelineContext::new(&vars, &request, &settings, &codes, &services);

        let html = insert_logo_markers(src, &vars, &settings);
        let mut header = Buffer::new(BufferKind::Header, parse(&html).fragment);
        let mut footer = Buffer::new(BufferKind::Footer, parse(&html).fragment);
        LogosStage.process(&mut header, &mut ctx).await.unwrap();
        LogosStage.process(&mut footer, &mut ctx).await.unwrap();

        let warnings = ctx.into_warnings().len();
        (serialize(&header.tree), fetcher.calls(), warnings)
    }

    #[tokio::test]
    async fn test_logo_inlined_once_per_render() {
        let (html, calls, warnings) = run(
            json!({ "ecole_logo": "https://x.supabase.co/logo.png" }),
            StubFetcher::ok("data:image/png;base64,AAAA"),
            "{ecole_logo}",
        )
        .await;
        assert_eq!(
            html,
            r#"<img src="data:image/png;base64,AAAA" alt="Logo" style="max-height: 55px; max-width: 140px; object-fit: contain;" />"#
        );
        assert_eq!(calls, 1);
        assert_eq!(warnings, 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_url() {
        let (html, _, warnings) = run(
            json!({ "ecole_logo": "https://x.supabase.co/logo.png" }),
            StubFetcher::failing(),
            "<div>{ecole_logo}</div>",
        )
        .await;
        assert!(html.contains(r#"<img src="https://x.supabase.co/logo.png""#));
        assert!(!html.contains("data:"));
        // One warning: the failure is cached for the second buffer
        assert_eq!(warnings, 1);
    }

    #[tokio::test]
    async fn test_template_marker_keeps_attributes() {
        let (html, calls, _) = run(
            json!({ "ecole_logo": "data:image/svg+xml;base64,PHN2Zz4=" }),
            StubFetcher::failing(),
            r#"<img class="brand" data-logo-var="{ecole_logo}" style="height: 40px">"#,
        )
        .await;
        assert_eq!(
            html,
            r#"<img src="data:image/svg+xml;base64,PHN2Zz4=" alt="Logo" class="brand" style="height: 40px" />"#
        );
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_template_marker_without_value_is_hidden() {
        let (html, _, _) = run(
            json!({}),
            StubFetcher::failing(),
            r#"<img data-logo-var="{ecole_logo}">"#,
        )
        .await;
        assert_eq!(html, r#"<img src="" alt="Logo" style="display: none;" />"#);
    }
}
