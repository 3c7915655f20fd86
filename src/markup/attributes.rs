//! Ordered element attributes.

/// Attributes of a parsed element, in source order.
///
/// Values are kept as written in the source (entities are not decoded);
/// callers setting computed values escape them first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, Option<String>)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.push((name.into(), value));
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Value of an attribute; valueless attributes read as `""`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .map(|i| self.0[i].1.as_deref().unwrap_or_default())
    }

    /// Set an attribute, replacing it in place or appending it.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.position(name) {
            Some(i) => self.0[i].1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let i = self.position(name)?;
        let (_, value) = self.0.remove(i);
        Some(value.unwrap_or_default())
    }

    /// Whether the `class` attribute lists a class.
    pub fn has_class(&self, class: &str) -> bool {
        self.get("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// Render as ` name="value"` pairs, ready to follow a tag name.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.0 {
            out.push(' ');
            out.push_str(name);
            if let Some(value) = value {
                if value.contains('"') && !value.contains('\'') {
                    out.push_str(&format!("='{value}'"));
                } else {
                    out.push_str(&format!("=\"{}\"", value.replace('"', "&quot;")));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Attributes {
        let mut a = Attributes::new();
        a.push("class", Some("logo qr-code-dynamic".into()));
        a.push("hidden", None);
        a.push("data-x", Some("a \"b\"".into()));
        a
    }

    #[test]
    fn test_get_set_remove() {
        let mut a = attrs();
        assert_eq!(a.get("CLASS"), Some("logo qr-code-dynamic"));
        assert_eq!(a.get("hidden"), Some(""));
        assert!(a.get("src").is_none());

        a.set("src", "x.png");
        a.set("class", "logo");
        assert_eq!(a.get("src"), Some("x.png"));
        assert_eq!(a.remove("hidden"), Some(String::new()));
        assert!(!a.has("hidden"));
        assert_eq!(a.iter().map(|(n, _)| n).collect::<Vec<_>>(), ["class", "data-x", "src"]);
    }

    #[test]
    fn test_has_class() {
        let a = attrs();
        assert!(a.has_class("qr-code-dynamic"));
        assert!(!a.has_class("qr-code"));
    }

    #[test]
    fn test_to_html_quotes() {
        assert_eq!(
            attrs().to_html(),
            " class=\"logo qr-code-dynamic\" hidden data-x='a \"b\"'"
        );
    }
}
