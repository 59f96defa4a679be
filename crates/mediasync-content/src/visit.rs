//! Schema-agnostic traversal of JSON documents.
//!
//! Content shape is owned by the CMS, so nothing here assumes a schema: every
//! array element and object value is visited and every string is offered to
//! the callback. Object keys are never inspected.

use serde_json::Value;

/// Call `visitor` for every string value in `value`, depth first.
pub fn visit_strings<'a, F>(value: &'a Value, visitor: &mut F)
where
    F: FnMut(&'a str),
{
    match value {
        Value::String(s) => visitor(s),
        Value::Array(items) => {
            for item in items {
                visit_strings(item, visitor);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                visit_strings(item, visitor);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Replace every string for which `rewrite` returns `Some`.
///
/// Returns the number of substitutions made.
pub fn rewrite_strings<F>(value: &mut Value, rewrite: &mut F) -> usize
where
    F: FnMut(&str) -> Option<String>,
{
    match value {
        Value::String(s) => match rewrite(s) {
            Some(replacement) => {
                *s = replacement;
                1
            }
            None => 0,
        },
        Value::Array(items) => items.iter_mut().map(|item| rewrite_strings(item, rewrite)).sum(),
        Value::Object(map) => map.values_mut().map(|item| rewrite_strings(item, rewrite)).sum(),
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
    }
}
