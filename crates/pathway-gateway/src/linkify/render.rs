//! JSON to HTML rendering.
//!
//! The renderer mirrors the JSON structure with syntax-class spans and
//! wraps classified values in anchors.  The transformation is total:
//! every input position produces exactly one output position, linked or
//! not.  Self-referential links render like any other, and no validity
//! pre-check runs.

use super::{LeafValue, LinkDetector};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde_json::Value as Json;
use std::fmt::Write;

/// Render a parsed JSON document as link-detected HTML.
pub fn render_json(root: &Json, detector: &LinkDetector, request_path: &str) -> String {
    let mut out = String::new();
    let mut key_path: Vec<String> = Vec::new();
    write_value(&mut out, root, detector, request_path, &mut key_path, 0);
    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn write_anchor(out: &mut String, href: &str, literal: &str) {
    let _ = write!(
        out,
        r#"<a href="{}" class="json-link">{}</a>"#,
        encode_double_quoted_attribute(href),
        encode_text(literal),
    );
}

fn write_span(out: &mut String, class: &str, literal: &str) {
    let _ = write!(
        out,
        r#"<span class="{}">{}</span>"#,
        class,
        encode_text(literal),
    );
}

fn write_value(
    out: &mut String,
    value: &Json,
    detector: &LinkDetector,
    request_path: &str,
    key_path: &mut Vec<String>,
    level: usize,
) {
    match value {
        Json::Null => write_span(out, "json-null", "null"),
        Json::Bool(flag) => write_span(out, "json-boolean", if *flag { "true" } else { "false" }),
        Json::Number(number) => {
            let literal = number.to_string();
            let linked = (number.is_i64() || number.is_u64())
                .then(|| detector.classify(key_path, LeafValue::Int(&literal), request_path))
                .flatten();
            match linked {
                Some(href) => write_anchor(out, &href, &literal),
                None => write_span(out, "json-number", &literal),
            }
        }
        Json::String(text) => {
            let literal =
                serde_json::to_string(text).unwrap_or_else(|_| format!("{text:?}"));
            match detector.classify(key_path, LeafValue::Str(text), request_path) {
                Some(href) => write_anchor(out, &href, &literal),
                None => write_span(out, "json-string", &literal),
            }
        }
        Json::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            for (idx, item) in items.iter().enumerate() {
                indent(out, level + 1);
                // Array indices are transparent to the key path.
                write_value(out, item, detector, request_path, key_path, level + 1);
                if idx + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, level);
            out.push(']');
        }
        Json::Object(members) => {
            if members.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            for (idx, (key, member)) in members.iter().enumerate() {
                indent(out, level + 1);
                let key_literal =
                    serde_json::to_string(key).unwrap_or_else(|_| format!("{key:?}"));
                write_span(out, "json-key", &key_literal);
                out.push_str(": ");
                key_path.push(key.clone());
                write_value(out, member, detector, request_path, key_path, level + 1);
                key_path.pop();
                if idx + 1 < members.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, level);
            out.push('}');
        }
    }
}
