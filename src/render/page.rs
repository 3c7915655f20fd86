//! Page assembly: print CSS and the final HTML document.

use serde::Serialize;
use tera::{Context, Tera};

use crate::config::RenderSettings;
use crate::template::Template;
use crate::util::{attr_escape, format_number, html_escape};

const DOCUMENT_TEMPLATE: &str = include_str!("templates/document.html");
const DOCUMENT_TEMPLATE_NAME: &str = "document.html";
const FORM_FIELDS_TEMPLATE: &str = include_str!("templates/form-fields.html");

/// Space between a running header or footer and the page content.
const RUNNING_GAP_MM: f64 = 5.0;

/// Screen pixels per millimetre at 96 DPI.
pub const PX_PER_MM: f64 = 3.78;

/// Share of a running header or footer height an image may take.
const RUNNING_IMAGE_RATIO: f64 = 0.6;

/// Room left for padding around a running header or footer, in px.
const RUNNING_PADDING_PX: f64 = 10.0;

/// Page geometry and typography, preformatted for the CSS.
#[derive(Debug, Serialize)]
pub struct PageLayout {
    pub size: &'static str,
    pub width_px: u32,
    pub height_px: u32,
    pub margin_top: String,
    pub margin_right: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub first_margin_top: String,
    pub header_height_px: String,
    pub footer_height_px: String,
    pub header_block_max_px: String,
    pub footer_block_max_px: String,
    pub header_image_max_px: String,
    pub footer_image_max_px: String,
    /// Content offsets on the first page: margin plus running element.
    pub content_top_px: String,
    pub content_bottom_px: String,
    pub content_width_px: String,
    pub content_height_px: String,
    pub running_header: bool,
    pub running_footer: bool,
    pub page_numbers: bool,
    pub font_size: String,
    pub running_font_size: String,
    pub table_font_size: String,
    pub h1_size: String,
    pub h2_size: String,
    pub h3_size: String,
}

impl PageLayout {
    pub fn new(template: &Template, settings: &RenderSettings) -> Self {
        let size = template.page_size();
        let (width_px, height_px) = size.pixels();
        let margins = template.margins();
        let header = template.header_enabled();
        let footer = template.footer_enabled();
        let fs = template.font_size();

        let margin_bottom = if footer {
            template.footer_height() + RUNNING_GAP_MM
        } else {
            margins.bottom
        };
        let first_margin_top = if header {
            template.header_height() + RUNNING_GAP_MM
        } else {
            margins.top
        };

        let px = |mm: f64| mm * PX_PER_MM;
        let header_px = px(template.header_height());
        let footer_px = px(template.footer_height());
        let content_top = if header {
            px(margins.top + RUNNING_GAP_MM) + header_px
        } else {
            px(margins.top)
        };
        let content_bottom = if footer {
            px(margins.bottom + RUNNING_GAP_MM) + footer_px
        } else {
            px(margins.bottom)
        };
        let content_width = f64::from(width_px) - px(margins.left) - px(margins.right);
        let content_height = f64::from(height_px) - content_top - content_bottom;

        Self {
            size: size.css_name(),
            width_px,
            height_px,
            margin_top: format_number(margins.top),
            margin_right: format_number(margins.right),
            margin_bottom: format_number(margin_bottom),
            margin_left: format_number(margins.left),
            first_margin_top: format_number(first_margin_top),
            header_height_px: format_number(header_px),
            footer_height_px: format_number(footer_px),
            header_block_max_px: format_number((header_px - RUNNING_PADDING_PX).max(0.0)),
            footer_block_max_px: format_number((footer_px - RUNNING_PADDING_PX).max(0.0)),
            header_image_max_px: format_number(header_px * RUNNING_IMAGE_RATIO),
            footer_image_max_px: format_number(footer_px * RUNNING_IMAGE_RATIO),
            content_top_px: format_number(content_top),
            content_bottom_px: format_number(content_bottom),
            content_width_px: format_number(content_width.max(0.0)),
            content_height_px: format_number(content_height.max(0.0)),
            running_header: header,
            running_footer: footer,
            page_numbers: settings.page_numbers,
            font_size: format_number(fs),
            running_font_size: format_number(fs * 0.85),
            table_font_size: format_number(fs * 0.9),
            h1_size: format_number(fs * 1.6),
            h2_size: format_number(fs * 1.4),
            h3_size: format_number(fs * 1.2),
        }
    }
}

/// Browser scripts needed by interactive form fields.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct FormScripts {
    pub calculations: bool,
    pub validation: bool,
}

impl FormScripts {
    pub fn detect(parts: &PageParts<'_>) -> Self {
        let sources = [parts.header, Some(parts.content), parts.footer];
        let any = |needle: &str| sources.iter().flatten().any(|s| s.contains(needle));
        Self {
            calculations: any("data-calculation-formula"),
            validation: any("form-field-interactive"),
        }
    }
}

/// Processed buffers of one document. `None` leaves the element out.
#[derive(Debug)]
pub struct PageParts<'a> {
    pub header: Option<&'a str>,
    pub content: &'a str,
    pub footer: Option<&'a str>,
}

/// Renders the document shell with Tera.
pub struct PageAssembler {
    tera: Tera,
}

impl PageAssembler {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("form-fields.html", FORM_FIELDS_TEMPLATE),
            (DOCUMENT_TEMPLATE_NAME, DOCUMENT_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    pub fn assemble(
        &self,
        template: &Template,
        settings: &RenderSettings,
        parts: &PageParts<'_>,
    ) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("lang", &settings.lang);
        context.insert("title", &html_escape(template.title()));
        context.insert("pagedjs_url", &attr_escape(settings.pagedjs_url.trim()));
        context.insert("page", &PageLayout::new(template, settings));
        context.insert("header", &parts.header);
        context.insert("footer", &parts.footer);
        context.insert("content", parts.content);
        context.insert("forms", &FormScripts::detect(parts));

        self.tera.render(DOCUMENT_TEMPLATE_NAME, &context)
    }
}

/// Estimated page count from the processed content length.
///
/// Layout happens in the browser, so this is only an estimate for listings.
pub fn page_count(content: &str, chars_per_page: usize) -> usize {
    let chars = content.chars().count();
    chars.div_ceil(chars_per_page.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(value: serde_json::Value) -> Template {
        serde_json::from_value(value).unwrap()
    }

    fn assemble(template: &Template, parts: PageParts<'_>) -> String {
        PageAssembler::new()
            .unwrap()
            .assemble(template, &RenderSettings::default(), &parts)
            .unwrap()
    }

    #[test]
    fn test_document_shell() {
        let t = template(json!({ "name": "Convention <A&B>" }));
        let html = assemble(
            &t,
            PageParts {
                header: Some("<p>Entête</p>"),
                content: "<p>Bonjour</p>",
                footer: Some("<p>Pied</p>"),
            },
        );

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<html lang="fr">"#));
        assert!(html.contains("<title>Convention &lt;A&amp;B&gt;</title>"));
        assert!(html.contains(r#"<script src="https://unpkg.com/pagedjs/dist/paged.polyfill.js"></script>"#));
        assert!(html.contains(r#"<header class="document-header"><p>Entête</p></header>"#));
        assert!(html.contains(r#"<footer class="document-footer"><p>Pied</p></footer>"#));
        assert!(html.contains(r#"<main class="document-content"><p>Bonjour</p></main>"#));
        assert!(html.find("<header").unwrap() < html.find("<main").unwrap());
    }

    #[test]
    fn test_missing_sections_are_left_out() {
        let t = template(json!({ "header_enabled": false, "footer_enabled": false }));
        let html = assemble(
            &t,
            PageParts {
                header: None,
                content: "x",
                footer: None,
            },
        );
        assert!(!html.contains("<header"));
        assert!(!html.contains("<footer"));
        assert!(!html.contains("element(headerEnv)"));
        assert!(!html.contains("element(footerEnv)"));
        assert!(html.contains("<title>Document</title>"));
    }

    #[test]
    fn test_page_css() {
        let t = template(json!({
            "page_size": "Letter",
            "margins": { "top": 20, "left": 12.5 },
            "font_size": 12,
            "header_height": 25,
            "footer_height": 15
        }));
        let html = assemble(
            &t,
            PageParts {
                header: Some(""),
                content: "",
                footer: None,
            },
        );

        assert!(html.contains("size: letter;"));
        assert!(html.contains("margin-top: 20mm;"));
        assert!(html.contains("margin-left: 12.5mm;"));
        // Footer enabled: room for the running footer
        assert!(html.contains("margin-bottom: 20mm;"));
        // First page leaves room for the running header
        assert!(html.contains("margin-top: 30mm;"));
        assert!(html.contains("width: 816px;"));
        assert!(html.contains("min-height: 1056px;"));
        assert!(html.contains("font-size: 12pt;"));
        assert!(html.contains("h1 { font-size: 19.2pt; }"));
        assert!(html.contains("counter(pages)"));
    }

    #[test]
    fn test_pixel_offsets() {
        let t = template(json!({
            "page_size": "Letter",
            "margins": { "top": 20, "left": 12.5 },
            "header_height": 25,
            "footer_height": 15
        }));
        let layout = PageLayout::new(&t, &RenderSettings::default());

        assert_eq!(layout.header_height_px, "94.5");
        assert_eq!(layout.footer_height_px, "56.7");
        // 20mm margin + 5mm gap + 25mm header
        assert_eq!(layout.content_top_px, "189");
        assert_eq!(layout.content_bottom_px, "132.3");
        assert_eq!(layout.content_width_px, "712.05");
        assert_eq!(layout.content_height_px, "734.7");
        assert_eq!(layout.header_image_max_px, "56.7");
        assert_eq!(layout.footer_block_max_px, "46.7");

        let html = assemble(
            &t,
            PageParts {
                header: Some("<img src=\"logo.png\">"),
                content: "",
                footer: Some(""),
            },
        );
        assert!(html.contains("--content-top: 189px;"));
        assert!(html.contains("--content-width: 712.05px;"));
        assert!(html.contains(".document-header img { max-height: 56.7px;"));
        assert!(html.contains(".document-footer img { max-height: 34.02px;"));
    }

    #[test]
    fn test_pixel_offsets_without_running_elements() {
        let t = template(json!({
            "margins": { "top": 10, "bottom": 30 },
            "header_enabled": false,
            "footer_enabled": false
        }));
        let layout = PageLayout::new(&t, &RenderSettings::default());

        assert_eq!(layout.content_top_px, "37.8");
        assert_eq!(layout.content_bottom_px, "113.4");
        // A4: 1123px high
        assert_eq!(layout.content_height_px, "971.8");
        assert_eq!(layout.content_width_px, "680.6");
    }

    #[test]
    fn test_disabled_polyfill() {
        let t = Template::default();
        let settings = RenderSettings {
            pagedjs_url: String::new(),
            ..RenderSettings::default()
        };
        let html = PageAssembler::new()
            .unwrap()
            .assemble(
                &t,
                &settings,
                &PageParts {
                    header: None,
                    content: "",
                    footer: None,
                },
            )
            .unwrap();
        assert!(!html.contains("<script"));
    }

    #[test]
    fn test_form_scripts_only_when_needed() {
        let t = Template::default();
        let plain = assemble(
            &t,
            PageParts {
                header: None,
                content: "<p>x</p>",
                footer: None,
            },
        );
        assert!(!plain.contains("data-calculation-formula"));
        assert!(!plain.contains("validation-message"));

        let content = concat!(
            r#"<input class="form-field-interactive" data-field-name="heures" required>"#,
            r#"<input data-calculation-formula="heures * 2" data-calculation-target="total">"#,
        );
        let html = assemble(
            &t,
            PageParts {
                header: None,
                content,
                footer: None,
            },
        );
        assert!(html.contains("querySelectorAll('[data-calculation-formula]')"));
        assert!(html.contains("Ce champ est obligatoire"));
        assert!(html.find("</main>").unwrap() < html.rfind("<script>").unwrap());
    }

    #[test]
    fn test_form_scripts_detected_per_part() {
        let footer = r#"<input class="form-field-interactive" name="visa">"#;
        let parts = PageParts {
            header: None,
            content: "",
            footer: Some(footer),
        };
        assert_eq!(
            FormScripts::detect(&parts),
            FormScripts {
                calculations: false,
                validation: true
            }
        );
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count("", 3000), 1);
        assert_eq!(page_count("a", 3000), 1);
        assert_eq!(page_count(&"a".repeat(3000), 3000), 1);
        assert_eq!(page_count(&"a".repeat(6000), 3000), 2);
        assert_eq!(page_count(&"é".repeat(3001), 3000), 2);
    }
}
