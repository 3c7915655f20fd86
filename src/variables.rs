//! Variable map built from the nested data object passed to a render.
//!
//! The data object is flattened into dotted (`student.first_name`) and
//! underscored (`student_first_name`) keys. Lookups go through a [`Scope`],
//! which layers loop bindings on top of the flat map.

use std::collections::BTreeMap;

use serde_json::Value;

/// One segment of a variable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parse a variable path like `items[0].label` or `session.trainer.name`.
///
/// Returns `None` if the text is not a valid path.
pub fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let bytes = path.as_bytes();
    let mut i = 0;
    let mut expect_key = true;

    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                let close = path[i..].find(']')? + i;
                let index = path[i + 1..close].trim().parse().ok()?;
                segments.push(Segment::Index(index));
                i = close + 1;
                expect_key = false;
            }
            b'.' => {
                if expect_key {
                    return None;
                }
                i += 1;
                expect_key = true;
            }
            _ => {
                if !expect_key {
                    return None;
                }
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                if start == i {
                    return None;
                }
                segments.push(Segment::Key(path[start..i].to_string()));
                expect_key = false;
            }
        }
    }

    match segments.first() {
        Some(Segment::Key(first))
            if !expect_key && first.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') =>
        {
            Some(segments)
        }
        _ => None,
    }
}

/// Walk into a value along a path.
///
/// A key segment applied to an array projects over its elements, so
/// `items.price` on a list of line items yields the list of prices.
pub fn traverse(value: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };

    match (first, value) {
        (Segment::Index(i), Value::Array(items)) => items.get(*i).and_then(|v| traverse(v, rest)),
        (Segment::Key(key), Value::Object(map)) => map.get(key).and_then(|v| traverse(v, rest)),
        (Segment::Key(_), Value::Array(items)) => Some(Value::Array(
            items.iter().filter_map(|v| traverse(v, segments)).collect(),
        )),
        _ => None,
    }
}

/// Flat key/value map for one render.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    flat: BTreeMap<String, Value>,
}

impl Variables {
    /// Build the map from a nested data object.
    ///
    /// Top-level keys are kept as given. Nested object fields get a dotted
    /// and an underscored key; an explicit key always wins over a derived one.
    pub fn from_data(data: &Value) -> Self {
        let mut flat = BTreeMap::new();

        if let Value::Object(map) = data {
            for (key, value) in map {
                flat.insert(key.clone(), value.clone());
            }
            for (key, value) in map {
                if let Value::Object(inner) = value {
                    flatten_into(&mut flat, key, key, inner);
                }
            }
        } else if !data.is_null() {
            tracing::warn!("variable data is not an object, ignoring it");
        }

        Self { flat }
    }

    /// Get a value by its exact flat key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.flat.get(key)
    }

    /// Look up a path: exact flat key first, then a nested walk.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.flat.get(path) {
            return Some(value.clone());
        }
        let segments = parse_path(path)?;
        self.lookup_segments(&segments)
    }

    /// Look up an already parsed path.
    pub fn lookup_segments(&self, segments: &[Segment]) -> Option<Value> {
        let (Segment::Key(first), rest) = segments.split_first()? else {
            return None;
        };
        traverse(self.flat.get(first)?, rest)
    }

    /// Display string for a flat key, empty when missing.
    pub fn text(&self, key: &str) -> String {
        self.flat.get(key).map(display).unwrap_or_default()
    }

    /// All flat keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.flat.keys().map(String::as_str)
    }
}

fn flatten_into(
    flat: &mut BTreeMap<String, Value>,
    dotted_prefix: &str,
    underscored_prefix: &str,
    map: &serde_json::Map<String, Value>,
) {
    for (key, value) in map {
        let dotted = format!("{dotted_prefix}.{key}");
        let underscored = format!("{underscored_prefix}_{key}");
        flat.entry(dotted.clone()).or_insert_with(|| value.clone());
        flat.entry(underscored.clone()).or_insert_with(|| value.clone());
        if let Value::Object(inner) = value {
            flatten_into(flat, &dotted, &underscored, inner);
        }
    }
}

/// Text shown in a document for a value.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => String::new(),
    }
}

/// Whether a value counts as true in a condition.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Numeric view of a value. Strings are parsed, accepting a decimal comma.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed
                .parse::<f64>()
                .ok()
                .or_else(|| trimmed.replace(',', ".").parse::<f64>().ok())
                .filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// A loop binding: the current element of a `{FOREACH}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Name the element is bound to (`item` unless aliased).
    pub name: String,
    pub value: Value,
    /// Zero-based position in the list.
    pub index: usize,
    pub count: usize,
}

impl Binding {
    /// The `loop.*` helper object exposed to loop bodies.
    fn loop_meta(&self) -> Value {
        serde_json::json!({
            "index": self.index + 1,
            "index0": self.index,
            "first": self.index == 0,
            "last": self.index + 1 == self.count,
            "count": self.count,
        })
    }
}

/// Variable lookup context: loop bindings layered over the variable map.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    vars: &'a Variables,
    bindings: Vec<Binding>,
}

impl<'a> Scope<'a> {
    pub fn new(vars: &'a Variables) -> Self {
        Self {
            vars,
            bindings: Vec::new(),
        }
    }

    /// A child scope with one more binding.
    pub fn with(&self, binding: Binding) -> Scope<'a> {
        let mut bindings = self.bindings.clone();
        bindings.push(binding);
        Scope {
            vars: self.vars,
            bindings,
        }
    }

    /// Resolve a path through loop bindings, then the variable map.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        match parse_path(path) {
            Some(segments) => self.lookup_segments(&segments),
            None => self.vars.get(path).cloned(),
        }
    }

    pub fn lookup_segments(&self, segments: &[Segment]) -> Option<Value> {
        if let Some((Segment::Key(first), rest)) = segments.split_first() {
            for binding in self.bindings.iter().rev() {
                if *first == binding.name {
                    return traverse(&binding.value, rest);
                }
            }
            if first == "loop"
                && let Some(innermost) = self.bindings.last()
            {
                return traverse(&innermost.loop_meta(), rest);
            }

            // Dotted flat keys (`student.first_name`) before a nested walk
            if let Some(value) = self.vars.get(&join_keys(segments)) {
                return Some(value.clone());
            }
        }
        self.vars.lookup_segments(segments)
    }

    /// Display text for a path, empty when unresolved.
    pub fn text(&self, path: &str) -> String {
        self.lookup(path).as_ref().map(display).unwrap_or_default()
    }
}

fn join_keys(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Variables {
        Variables::from_data(&json!({
            "first_name": "Marie",
            "student": { "first_name": "Marie", "last_name": "Curie", "address": { "city": "Paris" } },
            "student_first_name": "Explicit",
            "items": [
                { "label": "Module A", "price": 100 },
                { "label": "Module B", "price": "250,5" }
            ],
            "count": 0
        }))
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("items[0].label"),
            Some(vec![
                Segment::Key("items".into()),
                Segment::Index(0),
                Segment::Key("label".into())
            ])
        );
        assert!(parse_path("a..b").is_none());
        assert!(parse_path("a.").is_none());
        assert!(parse_path("9abc").is_none());
        assert!(parse_path("color: red").is_none());
        assert!(parse_path("").is_none());
    }

    #[test]
    fn test_flatten_dotted_and_underscored() {
        let vars = sample();
        assert_eq!(vars.text("student.last_name"), "Curie");
        assert_eq!(vars.text("student_last_name"), "Curie");
        assert_eq!(vars.text("student.address.city"), "Paris");
        assert_eq!(vars.text("student_address_city"), "Paris");
    }

    #[test]
    fn test_explicit_key_wins_over_alias() {
        let vars = sample();
        assert_eq!(vars.text("student_first_name"), "Explicit");
    }

    #[test]
    fn test_lookup_nested_and_projection() {
        let vars = sample();
        assert_eq!(vars.lookup("items[1].label"), Some(json!("Module B")));
        assert_eq!(vars.lookup("items.price"), Some(json!([100, "250,5"])));
        assert_eq!(vars.lookup("items[5].label"), None);
        assert_eq!(vars.lookup("missing"), None);
    }

    #[test]
    fn test_display_and_truthiness() {
        assert_eq!(display(&json!(null)), "");
        assert_eq!(display(&json!(12)), "12");
        assert_eq!(display(&json!(["a", "", "b"])), "a, b");
        assert_eq!(display(&json!({"a": 1})), "");
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("  ")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("non")));
        assert!(is_truthy(&json!(2.5)));
    }

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!("250,5")), Some(250.5));
        assert_eq!(as_number(&json!(" 12 ")), Some(12.0));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!(true)), Some(1.0));
        assert_eq!(as_number(&json!(null)), None);
    }

    #[test]
    fn test_scope_bindings_shadow_variables() {
        let vars = sample();
        let scope = Scope::new(&vars);
        let inner = scope.with(Binding {
            name: "first_name".into(),
            value: json!("Pierre"),
            index: 1,
            count: 2,
        });
        assert_eq!(scope.text("first_name"), "Marie");
        assert_eq!(inner.text("first_name"), "Pierre");
        assert_eq!(inner.text("loop.index"), "2");
        assert_eq!(inner.lookup("loop.last"), Some(json!(true)));
        assert_eq!(inner.text("student.last_name"), "Curie");
    }

    #[test]
    fn test_scope_without_loop_has_no_loop_meta() {
        let vars = sample();
        let scope = Scope::new(&vars);
        assert_eq!(scope.lookup("loop.index"), None);
    }
}
