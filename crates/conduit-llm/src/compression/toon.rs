//! TOON (Token-Oriented Object Notation) encoder
//!
//! A line-oriented rendering of JSON that drops most punctuation and states
//! each uniform array's fields once, which usually tokenizes much smaller
//! than the JSON it came from.

use std::fmt::Write as _;

use serde_json::{Map, Value};

const INDENT: &str = "  ";

/// Encode a JSON value as TOON
pub fn encode(value: &Value) -> String {
    let mut lines = Vec::new();
    match value {
        Value::Object(map) => encode_object(map, 0, &mut lines),
        Value::Array(items) => encode_array("", items, 0, &mut lines),
        primitive => lines.push(encode_primitive(primitive)),
    }
    lines.join("\n")
}

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn encode_object(map: &Map<String, Value>, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    for (key, value) in map {
        let key = encode_key(key);
        match value {
            Value::Object(nested) => {
                lines.push(format!("{pad}{key}:"));
                encode_object(nested, depth + 1, lines);
            }
            Value::Array(items) => encode_array(&key, items, depth, lines),
            primitive => lines.push(format!("{pad}{key}: {}", encode_primitive(primitive))),
        }
    }
}

fn encode_array(key: &str, items: &[Value], depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    let len = items.len();

    if items.iter().all(is_primitive) {
        let values = join(items.iter().map(encode_primitive));
        if values.is_empty() {
            lines.push(format!("{pad}{key}[{len}]:"));
        } else {
            lines.push(format!("{pad}{key}[{len}]: {values}"));
        }
        return;
    }

    if let Some(fields) = tabular_fields(items) {
        let header = join(fields.iter().map(|field| encode_key(field)));
        lines.push(format!("{pad}{key}[{len}]{{{header}}}:"));

        let row_pad = indent(depth + 1);
        for row in items.iter().filter_map(Value::as_object) {
            let values = join(
                fields
                    .iter()
                    .map(|field| row.get(*field).map_or_else(String::new, encode_primitive)),
            );
            lines.push(format!("{row_pad}{values}"));
        }
        return;
    }

    lines.push(format!("{pad}{key}[{len}]:"));
    for item in items {
        encode_list_item(item, depth + 1, lines);
    }
}

/// Render one `- item` line, hanging nested structure off the dash
fn encode_list_item(item: &Value, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    let start = lines.len();

    match item {
        Value::Object(map) if map.is_empty() => {
            lines.push(format!("{pad}-"));
            return;
        }
        Value::Object(map) => encode_object(map, depth + 1, lines),
        Value::Array(items) => encode_array("", items, depth + 1, lines),
        primitive => {
            lines.push(format!("{pad}- {}", encode_primitive(primitive)));
            return;
        }
    }

    let child_pad = indent(depth + 1);
    if let Some(first) = lines.get_mut(start)
        && let Some(rest) = first.strip_prefix(child_pad.as_str())
    {
        *first = format!("{pad}- {rest}");
    }
}

/// Fields of an array of objects that share one primitive-only key set
fn tabular_fields(items: &[Value]) -> Option<Vec<&str>> {
    let first = items.first()?.as_object()?;
    if first.is_empty() {
        return None;
    }
    let fields: Vec<&str> = first.keys().map(String::as_str).collect();

    let uniform = items.iter().all(|item| {
        item.as_object().is_some_and(|row| {
            row.len() == fields.len() && fields.iter().all(|field| row.get(*field).is_some_and(is_primitive))
        })
    });

    uniform.then_some(fields)
}

const fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn join(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<_>>().join(",")
}

fn encode_primitive(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => encode_string(s),
        composite => composite.to_string(),
    }
}

fn encode_key(key: &str) -> String {
    let mut chars = key.chars();
    let bare = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if bare { key.to_owned() } else { quote(key) }
}

fn encode_string(s: &str) -> String {
    if needs_quotes(s) { quote(s) } else { s.to_owned() }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || matches!(s, "true" | "false" | "null")
        || s.parse::<f64>().is_ok()
        || s.starts_with('-')
        || s.chars()
            .any(|c| matches!(c, ',' | ':' | '"' | '\\' | '[' | ']' | '{' | '}') || c.is_control())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
