//! Stored document template record.
//!
//! Templates come from the hosted database (or a JSON/YAML file in the CLI)
//! and have grown several shapes over time: `content` may be a plain HTML
//! string or an editor object with `html` / `elements`, and header/footer
//! settings may be flat fields or nested objects. Accessors here resolve
//! those shapes with a fixed precedence.

use serde::{Deserialize, Serialize};

pub const DEFAULT_HEADER_HEIGHT_MM: f64 = 30.0;
pub const DEFAULT_FOOTER_HEIGHT_MM: f64 = 20.0;
pub const DEFAULT_MARGIN_MM: f64 = 15.0;
pub const DEFAULT_FONT_SIZE_PT: f64 = 10.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Classification (convention, attestation, convocation...).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub header: Option<Section>,
    #[serde(default)]
    pub footer: Option<Section>,

    #[serde(default)]
    pub header_enabled: Option<bool>,
    #[serde(default)]
    pub footer_enabled: Option<bool>,
    #[serde(default)]
    pub header_height: Option<f64>,
    #[serde(default)]
    pub footer_height: Option<f64>,

    #[serde(default)]
    pub page_size: Option<PageSize>,
    #[serde(default)]
    pub margins: Option<Margins>,
    #[serde(default)]
    pub font_size: Option<f64>,
}

/// Template body: a plain HTML string or an editor object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Html(String),
    Structured(StructuredContent),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredContent {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default, rename = "pageSize")]
    pub page_size: Option<PageSize>,
}

/// One editor block. Older editors stored the markup under different names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl Element {
    fn markup(&self) -> Option<&str> {
        [&self.content, &self.html, &self.text, &self.value]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.trim().is_empty())
    }
}

/// Header or footer: a plain HTML string or a settings object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section {
    Html(String),
    Settings(SectionSettings),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionSettings {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl Section {
    fn html(&self) -> &str {
        match self {
            Section::Html(html) => html,
            Section::Settings(s) => s.content.as_deref().unwrap_or_default(),
        }
    }

    fn height(&self) -> Option<f64> {
        match self {
            Section::Html(_) => None,
            Section::Settings(s) => s.height,
        }
    }

    fn enabled(&self) -> Option<bool> {
        match self {
            Section::Html(_) => None,
            Section::Settings(s) => s.enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PageSize {
    /// Page size in CSS pixels at 96 dpi.
    pub fn pixels(self) -> (u32, u32) {
        match self {
            PageSize::A4 => (794, 1123),
            PageSize::Letter => (816, 1056),
            PageSize::Legal => (816, 1344),
        }
    }

    /// Name used in the CSS `@page { size }` rule.
    pub fn css_name(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
        }
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    #[serde(default)]
    pub top: Option<f64>,
    #[serde(default)]
    pub right: Option<f64>,
    #[serde(default)]
    pub bottom: Option<f64>,
    #[serde(default)]
    pub left: Option<f64>,
}

/// Margins with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMargins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Template {
    /// The body markup, resolved from whichever shape the record uses.
    ///
    /// Missing or blank content yields an empty string and a warning.
    pub fn content_html(&self) -> String {
        let html = match &self.content {
            Some(Content::Html(html)) => html.clone(),
            Some(Content::Structured(s)) => match s.html.as_deref() {
                Some(html) if !html.trim().is_empty() => html.to_string(),
                _ => s
                    .elements
                    .iter()
                    .filter_map(Element::markup)
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            None => String::new(),
        };

        if html.trim().is_empty() {
            tracing::warn!(
                template_id = self.id.as_deref().unwrap_or("-"),
                "template has no content, rendering an empty body"
            );
            return String::new();
        }
        html
    }

    pub fn header_html(&self) -> &str {
        self.header.as_ref().map(Section::html).unwrap_or_default()
    }

    pub fn footer_html(&self) -> &str {
        self.footer.as_ref().map(Section::html).unwrap_or_default()
    }

    pub fn header_enabled(&self) -> bool {
        self.header_enabled
            .or_else(|| self.header.as_ref().and_then(Section::enabled))
            .unwrap_or(true)
    }

    pub fn footer_enabled(&self) -> bool {
        self.footer_enabled
            .or_else(|| self.footer.as_ref().and_then(Section::enabled))
            .unwrap_or(true)
    }

    /// Header height in millimetres.
    pub fn header_height(&self) -> f64 {
        self.header
            .as_ref()
            .and_then(Section::height)
            .or(self.header_height)
            .unwrap_or(DEFAULT_HEADER_HEIGHT_MM)
    }

    /// Footer height in millimetres.
    pub fn footer_height(&self) -> f64 {
        self.footer
            .as_ref()
            .and_then(Section::height)
            .or(self.footer_height)
            .unwrap_or(DEFAULT_FOOTER_HEIGHT_MM)
    }

    pub fn page_size(&self) -> PageSize {
        let from_content = match &self.content {
            Some(Content::Structured(s)) => s.page_size,
            _ => None,
        };
        from_content.or(self.page_size).unwrap_or_default()
    }

    pub fn margins(&self) -> ResolvedMargins {
        let m = self.margins.unwrap_or_default();
        ResolvedMargins {
            top: m.top.unwrap_or(DEFAULT_MARGIN_MM),
            right: m.right.unwrap_or(DEFAULT_MARGIN_MM),
            bottom: m.bottom.unwrap_or(DEFAULT_MARGIN_MM),
            left: m.left.unwrap_or(DEFAULT_MARGIN_MM),
        }
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
            .filter(|f| *f > 0.0)
            .unwrap_or(DEFAULT_FONT_SIZE_PT)
    }

    /// Title for the HTML document.
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Document")
    }
}
