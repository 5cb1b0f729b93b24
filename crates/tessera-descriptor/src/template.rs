//! Template rendering for endpoint URLs, headers, query and body values.
//!
//! Every `${name}` occurrence in a string is replaced with the context value
//! for `name`. Rendering is a single pass: substituted text is never scanned
//! again, and placeholders with no context entry are left as written.

use serde_json::Value;
use std::collections::BTreeMap;

/// Values available to templates during one check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
}

impl RenderContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding the candidate under `phone`.
    #[must_use]
    pub fn for_candidate(candidate: &str) -> Self {
        Self::new().with("phone", candidate)
    }

    /// Add or replace a value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Look up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Render one string template.
    #[must_use]
    pub fn render_str(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            let value = after
                .find('}')
                .and_then(|end| self.values.get(&after[..end]).map(|v| (end, v)));
            match value {
                Some((end, value)) => {
                    out.push_str(value);
                    rest = &after[end + 1..];
                }
                // Not a known placeholder: keep `${` and rescan right after it.
                None => {
                    out.push_str("${");
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Render a template value; non-string values pass through unchanged.
    #[must_use]
    pub fn render_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.render_str(s)),
            other => other.clone(),
        }
    }

    /// Render every value of a template map.
    #[must_use]
    pub fn render_map(&self, map: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        map.iter()
            .map(|(k, v)| (k.clone(), self.render_value(v)))
            .collect()
    }
}

/// Stringify a rendered value for use on the wire.
///
/// Strings are used as-is, `null` becomes empty, everything else uses its
/// JSON text.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
