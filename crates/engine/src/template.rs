// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Template reference resolution for pipeline node parameters.
//!
//! A param string may contain `{{IDENTIFIER}}` references, where
//! `IDENTIFIER` is either `params.NAME` (a pipeline-level parameter) or
//! `NODE_ID.FIELD` (a field of an already-executed node's result).
//! Identifiers are matched non-greedily up to the first `}}` and are not
//! trimmed of internal whitespace — `{{ params.x }}` looks up the literal
//! key `" params.x "`, which simply won't resolve.
//!
//! Each param string is parsed once, at pipeline load, into an ordered
//! list of [`Fragment`]s rather than re-scanned on every wave. This also
//! makes the single-ref short-circuit — a string that is *exactly* one
//! reference resolves to the referenced value's original JSON type
//! rather than a stringification — a simple structural check instead of
//! a second regex pass.

use serde_json::Value;

/// One piece of a parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Literal(String),
    Reference(String),
}

/// A param string parsed into fragments, with the single-ref fast path
/// precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    fragments: Vec<Fragment>,
    is_single_ref: bool,
}

impl Template {
    /// Parses `input`, scanning for `{{` ... `}}` pairs. Unterminated
    /// `{{` (no following `}}`) is treated as literal text, matching a
    /// regex `\{\{(.+?)\}\}` scan that simply fails to match there.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut fragments = Vec::new();
        let mut literal = String::new();
        let bytes = input.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'{' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
                if let Some(end) = input[i + 2..].find("}}") {
                    let reference = &input[i + 2..i + 2 + end];
                    if !literal.is_empty() {
                        fragments.push(Fragment::Literal(std::mem::take(&mut literal)));
                    }
                    fragments.push(Fragment::Reference(reference.to_string()));
                    i += 2 + end + 2;
                    continue;
                }
            }
            let ch_len = input[i..].chars().next().map_or(1, char::len_utf8);
            literal.push_str(&input[i..i + ch_len]);
            i += ch_len;
        }
        if !literal.is_empty() || fragments.is_empty() {
            fragments.push(Fragment::Literal(literal));
        }
        let is_single_ref = fragments.len() == 1 && matches!(fragments[0], Fragment::Reference(_));
        Self { fragments, is_single_ref }
    }

    /// Resolves every reference via `lookup`, which receives the raw
    /// identifier (`"params.foo"` or `"node_id.field"`) and returns the
    /// value it refers to, if any.
    ///
    /// A miss leaves the literal `{{ref}}` text in place rather than
    /// erroring, so a pipeline author's typo surfaces as an obviously
    /// unresolved string in the result rather than aborting the run.
    pub fn resolve(&self, lookup: impl Fn(&str) -> Option<Value>) -> Value {
        if self.is_single_ref {
            if let Fragment::Reference(reference) = &self.fragments[0] {
                if let Some(value) = lookup(reference) {
                    return value;
                }
                return Value::String(format!("{{{{{reference}}}}}"));
            }
        }
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(text) => out.push_str(text),
                Fragment::Reference(reference) => match lookup(reference) {
                    Some(Value::String(s)) => out.push_str(&s),
                    Some(other) => out.push_str(&value_to_plain_string(&other)),
                    None => {
                        out.push_str("{{");
                        out.push_str(reference);
                        out.push_str("}}");
                    }
                },
            }
        }
        Value::String(out)
    }
}

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Splits a template identifier into `("params", name)` or
/// `(node_id, field)`, whichever applies. Returns `None` if `identifier`
/// has no `.` separator.
#[must_use]
pub fn split_identifier(identifier: &str) -> Option<(&str, &str)> {
    identifier.split_once('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(map: &HashMap<&str, Value>) -> impl Fn(&str) -> Option<Value> + '_ {
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_literal_only_string() {
        let template = Template::parse("hello world");
        assert_eq!(template.fragments, vec![Fragment::Literal("hello world".to_string())]);
    }

    #[test]
    fn parses_single_reference() {
        let template = Template::parse("{{params.name}}");
        assert!(template.is_single_ref);
        assert_eq!(template.fragments, vec![Fragment::Reference("params.name".to_string())]);
    }

    #[test]
    fn single_ref_shortcut_preserves_type() {
        let mut map: HashMap<&str, Value> = HashMap::new();
        map.insert("node_a.count", Value::from(42));
        let template = Template::parse("{{node_a.count}}");
        let resolved = template.resolve(lookup_from(&map));
        assert_eq!(resolved, Value::from(42));
    }

    #[test]
    fn mixed_literal_and_reference_stringifies() {
        let mut map: HashMap<&str, Value> = HashMap::new();
        map.insert("params.x", Value::from(3));
        let template = Template::parse("value is {{params.x}}!");
        let resolved = template.resolve(lookup_from(&map));
        assert_eq!(resolved, Value::String("value is 3!".to_string()));
    }

    #[test]
    fn unresolved_reference_preserves_literal_braces() {
        let map: HashMap<&str, Value> = HashMap::new();
        let template = Template::parse("{{unknown.field}}");
        let resolved = template.resolve(lookup_from(&map));
        assert_eq!(resolved, Value::String("{{unknown.field}}".to_string()));
    }

    #[test]
    fn whitespace_inside_braces_is_not_trimmed() {
        let template = Template::parse("{{ params.x }}");
        assert_eq!(template.fragments, vec![Fragment::Reference(" params.x ".to_string())]);
    }

    #[test]
    fn split_identifier_separates_prefix_and_field() {
        assert_eq!(split_identifier("params.name"), Some(("params", "name")));
        assert_eq!(split_identifier("scene_0_keyframe.image_base64"), Some(("scene_0_keyframe", "image_base64")));
        assert_eq!(split_identifier("noseparator"), None);
    }
}
