//! Response normalization: turns model output into the result document
//!
//! The model is asked for strict JSON but routinely wraps it in code fences,
//! escapes it twice, or runs out of tokens halfway through. Repair happens in
//! three stages:
//! 1. `clean_response_text`: textual cleanup and slicing to the `{...}` span
//! 2. `parse_with_repair`: parse, then retry on progressively narrower
//!    candidates built from a bracket scan
//! 3. `normalize_document`: coerce `data.companies` into flat string rows and
//!    fill in the envelope defaults

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeSet;

use super::extract::{normalize_key, strip_preserve_phrase, MessageHints};
use super::prompt::{SCHEMA_FIELDS, TEMPLATE_PLACEHOLDERS};
use super::InterpretError;

/// Key given to company entries that arrive as bare scalars.
pub const SCALAR_VALUE_KEY: &str = "value";

/// Values models emit when they have nothing to say about a field.
pub const BOILERPLATE_VALUES: [&str; 8] = [
    "total strength",
    "n/a",
    "na",
    "none",
    "null",
    "unknown",
    "not available",
    "-",
];

// ============================================================================
// Stage 1: text cleanup
// ============================================================================

/// Best-effort textual repair of a model reply. Valid JSON passes through
/// unchanged apart from whitespace collapsing.
pub fn clean_response_text(raw: &str) -> String {
    let mut text = flatten_whitespace_escapes(raw.trim());
    text = text.replace(['\r', '\n', '\t'], " ");

    // A doubly encoded document: every quote arrives escaped.
    if text.contains("{\\\"") {
        text = text.replace("\\\"", "\"");
    }

    text = strip_code_fences(&text);
    text = drop_stray_backslashes(&text);

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            text = text[start..=end].to_string();
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn `\n`, `\r` and `\t` escapes into spaces and `\_` into `_`. An escaped
/// backslash is copied through as a pair, so `C:\\new` keeps its `n`.
fn flatten_whitespace_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('n' | 'r' | 't') => {
                out.push(' ');
                chars.next();
            }
            Some('_') => {
                out.push('_');
                chars.next();
            }
            Some('\\') => {
                out.push_str("\\\\");
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_code_fences(text: &str) -> String {
    let mut out = text.replace("```json", "").replace("```JSON", "").replace("```", "");
    let trimmed = out.trim_start();
    if trimmed.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
        out = trimmed[4..].to_string();
    }
    out.trim().to_string()
}

/// Remove backslashes that do not start a valid JSON escape.
fn drop_stray_backslashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                out.push(c);
                out.push(next);
                chars.next();
            }
            _ => {}
        }
    }
    out
}

// ============================================================================
// Stage 2: parse with repair
// ============================================================================

/// Parse `text`, falling back to narrower candidates when it is not valid
/// JSON:
/// - the prefix ending at the `}` that closes the outermost object
/// - the prefix ending at the last complete `}`, with every bracket still
///   open at that point closed (output truncated by the token limit)
///
/// Returns the error from the first attempt when nothing parses.
pub fn parse_with_repair(text: &str) -> Result<Value, serde_json::Error> {
    let first_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let recovered = repair_candidates(text).into_iter().find_map(|candidate| {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "Repair candidate did not parse");
                None
            }
        }
    });

    match recovered {
        Some(value) => {
            tracing::info!(error = %first_error, "Recovered model response after JSON repair");
            Ok(value)
        }
        None => Err(first_error),
    }
}

#[derive(Debug, Default)]
struct BracketScan {
    /// Byte offset just past the `}` that empties the bracket stack.
    outer_end: Option<usize>,
    /// Byte offset just past the last `}` and the brackets open after it.
    last_close: Option<(usize, Vec<char>)>,
}

/// Walk `text` outside string literals and record where objects close. Stops
/// at the first mismatched bracket.
fn scan_brackets(text: &str) -> BracketScan {
    let mut scan = BracketScan::default();
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' | ']' => {
                let expected = if c == '}' { '{' } else { '[' };
                if stack.pop() != Some(expected) {
                    break;
                }
                if c == '}' {
                    let end = i + c.len_utf8();
                    if stack.is_empty() && scan.outer_end.is_none() {
                        scan.outer_end = Some(end);
                    }
                    scan.last_close = Some((end, stack.clone()));
                }
            }
            _ => {}
        }
    }

    scan
}

fn repair_candidates(text: &str) -> Vec<Cow<'_, str>> {
    let scan = scan_brackets(text);
    let mut candidates: Vec<Cow<'_, str>> = Vec::new();

    if let Some(end) = scan.outer_end {
        if end < text.len() {
            candidates.push(Cow::Borrowed(&text[..end]));
        }
    }

    if let Some((end, open)) = scan.last_close {
        if !open.is_empty() {
            let mut closed = text[..end].to_string();
            for bracket in open.iter().rev() {
                closed.push(if *bracket == '{' { '}' } else { ']' });
            }
            candidates.push(Cow::Owned(closed));
        }
    }

    candidates
}

// ============================================================================
// Stage 3: document normalization
// ============================================================================

/// Flatten a field value into display text.
pub fn flatten_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(flatten_value).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map.values().map(flatten_value).collect::<Vec<_>>().join(", "),
    }
}

/// Empty, boilerplate, or an echoed template placeholder.
pub fn is_trivial_value(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return true;
    }
    let lower = text.to_lowercase();
    BOILERPLATE_VALUES.contains(&lower.as_str())
        || TEMPLATE_PLACEHOLDERS
            .iter()
            .any(|(_, example)| example.eq_ignore_ascii_case(text))
}

/// Turn one element of `data.companies` into a field map.
fn coerce_company(item: Value) -> Map<String, Value> {
    match item {
        Value::Object(map) => map,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert("company_name".to_string(), Value::String(s));
                map
            }
        },
        other => {
            let mut map = Map::new();
            map.insert(SCALAR_VALUE_KEY.to_string(), Value::String(flatten_value(&other)));
            map
        }
    }
}

/// Columns of the response template, plus the requested custom column.
fn schema_keys(hints: &MessageHints) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = SCHEMA_FIELDS.iter().map(|f| f.to_string()).collect();
    keys.insert(SCALAR_VALUE_KEY.to_string());
    if let Some(col) = &hints.custom_column {
        keys.insert(col.field_key());
    }
    keys
}

fn normalize_company(
    entry: Map<String, Value>,
    schema: &BTreeSet<String>,
    relevant: &BTreeSet<String>,
) -> Map<String, Value> {
    let mut row = Map::new();

    for (key, value) in entry {
        let display_key = strip_preserve_phrase(&key);
        let match_key = normalize_key(&display_key);
        if display_key.is_empty() || match_key == "table_name" {
            continue;
        }

        let text = flatten_value(&value);

        if schema.contains(&match_key) {
            row.insert(display_key, Value::String(text));
        } else if relevant.contains(&match_key) && !is_trivial_value(&text) {
            row.insert(display_key, Value::String(text));
        } else {
            tracing::debug!(field = %key, "Dropping company field outside the requested set");
        }
    }

    row
}

/// Apply company-row normalization and envelope defaults to a parsed reply.
pub fn normalize_document(document: Value, hints: &MessageHints) -> Result<Value, InterpretError> {
    let mut root = match document {
        Value::Object(map) => map,
        other => {
            return Err(InterpretError::Parse {
                message: format!("Expected a JSON object, got {}", json_kind(&other)),
                raw_response: other.to_string(),
            })
        }
    };

    let mut data = match root.remove("data") {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "Model returned non-object data; discarding");
            Map::new()
        }
    };

    let items = match data.remove("companies") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => Vec::new(),
        Some(single) => vec![single],
    };

    let schema = schema_keys(hints);
    let companies: Vec<Value> = items
        .into_iter()
        .map(|item| {
            Value::Object(normalize_company(
                coerce_company(item),
                &schema,
                &hints.relevant_fields,
            ))
        })
        .collect();

    data.insert("companies".to_string(), Value::Array(companies));
    root.insert("data".to_string(), Value::Object(data));

    if root.get("summary").map_or(true, Value::is_null) {
        root.insert("summary".to_string(), Value::String(String::new()));
    }
    if root.get("key_insights").map_or(true, Value::is_null) {
        root.insert("key_insights".to_string(), Value::Array(Vec::new()));
    }

    Ok(Value::Object(root))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Full pipeline over one raw model reply.
pub fn normalize_response(raw: &str, hints: &MessageHints) -> Result<Value, InterpretError> {
    let cleaned = clean_response_text(raw);

    let document = parse_with_repair(&cleaned).map_err(|e| InterpretError::Parse {
        message: format!("Failed to parse JSON response: {}", e),
        raw_response: cleaned.clone(),
    })?;

    normalize_document(document, hints)
}

// ============================================================================
// TESTS
// ============================================================================
