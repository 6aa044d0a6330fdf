//! `{{var}}` template resolution.
//!
//! Templates are split into literal and reference tokens by a small scanner
//! rather than a regex. A reference names a variable or a dotted path into
//! one (`{{user.name}}`, `{{rows.0.id}}`). References that do not resolve are
//! emitted unchanged, braces included. `\{{` produces a literal `{{`.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    Literal(String),
    /// `path` is the trimmed reference, `raw` the original `{{ ... }}` text.
    Reference { path: String, raw: String },
}

/// Split a template into literal and reference tokens.
pub fn tokenize(input: &str) -> Vec<TemplateToken> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("\\{{") {
            literal.push_str("{{");
            rest = after;
            continue;
        }
        if let Some(after_open) = rest.strip_prefix("{{") {
            match after_open.find("}}") {
                Some(close) => {
                    let inner = &after_open[..close];
                    let path = inner.trim();
                    let raw = &rest[..close + 4];
                    if path.is_empty() || path.contains("{{") {
                        literal.push_str("{{");
                        rest = after_open;
                        continue;
                    }
                    if !literal.is_empty() {
                        tokens.push(TemplateToken::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(TemplateToken::Reference {
                        path: path.to_string(),
                        raw: raw.to_string(),
                    });
                    rest = &after_open[close + 2..];
                }
                None => {
                    literal.push_str(rest);
                    rest = "";
                }
            }
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            literal.push(c);
        }
        rest = chars.as_str();
    }

    if !literal.is_empty() {
        tokens.push(TemplateToken::Literal(literal));
    }
    tokens
}

/// Look up a dotted path (`a.b.0`) in a variables map.
pub fn lookup_path<'v>(variables: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let root = segments.next()?.trim();
    let mut current = variables.get(root)?;
    for segment in segments {
        let segment = segment.trim();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a template to a string. Strings are inserted verbatim, other values
/// as compact JSON.
pub fn render(template: &str, variables: &Map<String, Value>) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    for token in tokenize(template) {
        match token {
            TemplateToken::Literal(text) => out.push_str(&text),
            TemplateToken::Reference { path, raw } => match lookup_path(variables, &path) {
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => out.push_str(&raw),
            },
        }
    }
    out
}

/// Resolve templates inside an arbitrary JSON value.
///
/// A string that consists of exactly one resolvable reference takes the
/// referenced value with its JSON type intact, so `"{{rows}}"` can pass an
/// array through to a request body.
pub fn resolve_value(value: &Value, variables: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => {
            if !s.contains("{{") {
                return value.clone();
            }
            let tokens = tokenize(s);
            if let [TemplateToken::Reference { path, .. }] = tokens.as_slice() {
                if let Some(found) = lookup_path(variables, path) {
                    return found.clone();
                }
            }
            Value::String(render(s, variables))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, variables)).collect()),
        Value::Object(map) => Value::Object(resolve_map(map, variables)),
        other => other.clone(),
    }
}

/// Resolve templates in every value of a parameter map.
pub fn resolve_map(map: &Map<String, Value>, variables: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, variables)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_no_template_is_noop() {
        let v = vars(json!({ "name": "Ada" }));
        assert_eq!(render("plain text { not a ref }", &v), "plain text { not a ref }");
        assert_eq!(resolve_value(&json!(42), &v), json!(42));
    }

    #[test]
    fn test_render_references() {
        let v = vars(json!({ "name": "Ada", "user": { "age": 36, "tags": ["x", "y"] } }));
        assert_eq!(render("Hello {{name}}!", &v), "Hello Ada!");
        assert_eq!(render("{{ user.age }} years", &v), "36 years");
        assert_eq!(render("tag={{user.tags.1}}", &v), "tag=y");
        assert_eq!(render("{{user.tags}}", &v), r#"["x","y"]"#);
    }

    #[test]
    fn test_unresolved_reference_passes_through() {
        let v = vars(json!({ "name": "Ada" }));
        assert_eq!(render("Hi {{missing}} and {{ name }}", &v), "Hi {{missing}} and Ada");
        assert_eq!(resolve_value(&json!("{{missing}}"), &v), json!("{{missing}}"));
    }

    #[test]
    fn test_escape_and_unterminated() {
        let v = vars(json!({ "name": "Ada" }));
        assert_eq!(render(r"\{{name}} is {{name}}", &v), "{{name}} is Ada");
        assert_eq!(render("open {{name", &v), "open {{name");
        assert_eq!(render("empty {{}}", &v), "empty {{}}");
    }

    #[test]
    fn test_tokenize_shapes() {
        assert_eq!(
            tokenize("a {{ b }} c"),
            vec![
                TemplateToken::Literal("a ".into()),
                TemplateToken::Reference { path: "b".into(), raw: "{{ b }}".into() },
                TemplateToken::Literal(" c".into()),
            ]
        );
    }

    #[test]
    fn test_whole_reference_keeps_type() {
        let v = vars(json!({ "rows": [1, 2, 3], "n": 7 }));
        let params = json!({ "items": "{{rows}}", "label": "n={{n}}", "nested": { "count": "{{n}}" } });
        assert_eq!(
            resolve_value(&params, &v),
            json!({ "items": [1, 2, 3], "label": "n=7", "nested": { "count": 7 } })
        );
    }
}
