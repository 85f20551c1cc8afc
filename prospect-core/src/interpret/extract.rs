//! Heuristic reading of the user's message
//!
//! English phrasing only. Finds an optional custom column request
//! ("include <content> as <name>"), an optional location phrase, and the set
//! of table fields the user seems to be asking about.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Phrase the chat client appends to custom-column requests. It is metadata
/// for the model, never part of a column name.
pub const PRESERVE_PHRASE: &str = "while preserving existing data";

/// Fields every table carries regardless of what the message mentions.
pub const ESSENTIAL_FIELDS: [&str; 3] = ["company_name", "location", "investors"];

/// Keyword table: field name → substrings that signal interest in it.
pub const FIELD_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "company_name",
        &["company", "startup", "business", "organization", "companies"],
    ),
    ("location", &["location", "based in", "from", "in", "where"]),
    ("funding_amount", &["funding", "raised", "investment", "money"]),
    (
        "investors",
        &["investors", "backed by", "invested by", "vc", "vcs", "venture capital"],
    ),
    ("industry", &["industry", "sector", "field", "domain"]),
    ("established_year", &["year", "established", "founded", "started"]),
    ("funding_stage", &["stage", "series", "round"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomColumn {
    pub name: String,
    pub content: String,
}

impl CustomColumn {
    /// Key used when matching model output fields against this column.
    pub fn field_key(&self) -> String {
        normalize_key(&self.name)
    }
}

/// Everything the interpreter learned from the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHints {
    pub custom_column: Option<CustomColumn>,
    pub location: Option<String>,
    pub relevant_fields: BTreeSet<String>,
}

/// Strategy for deciding which fields a message asks about.
pub trait FieldDetector: Send + Sync {
    fn detect(&self, message: &str) -> BTreeSet<String>;

    fn name(&self) -> &str;
}

/// Substring matching against `FIELD_KEYWORDS`, plus the essential fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordFieldDetector;

impl FieldDetector for KeywordFieldDetector {
    fn detect(&self, message: &str) -> BTreeSet<String> {
        let message = message.to_lowercase();

        let mut fields: BTreeSet<String> =
            ESSENTIAL_FIELDS.iter().map(|f| f.to_string()).collect();

        for (field, keywords) in FIELD_KEYWORDS {
            if keywords.iter().any(|k| message.contains(k)) {
                fields.insert(field.to_string());
            }
        }

        fields
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Run every extraction step over `message`.
pub fn extract_hints(message: &str, detector: &dyn FieldDetector) -> MessageHints {
    let custom_column = extract_custom_column(message);
    let location = extract_location(message);

    let mut relevant_fields = detector.detect(message);
    if let Some(col) = &custom_column {
        relevant_fields.insert(col.field_key());
    }

    MessageHints {
        custom_column,
        location,
        relevant_fields,
    }
}

fn custom_column_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\binclude\s+(\S.*?)\s+as\s+(\S[^.]*)").expect("valid custom column regex")
    })
}

fn location_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:in|at|from)\s+(.+?)(?:,?\s+(?:and\s+|also\s+)?include\b|[.;!?\n]|$)")
            .expect("valid location regex")
    })
}

/// "include <content> as <name>" up to the next period or end of text.
pub fn extract_custom_column(message: &str) -> Option<CustomColumn> {
    let caps = custom_column_regex().captures(message)?;
    let content = caps.get(1)?.as_str().trim().to_string();
    let name = strip_preserve_phrase(caps.get(2)?.as_str());

    if content.is_empty() || name.is_empty() {
        return None;
    }

    Some(CustomColumn { name, content })
}

/// The phrase after "in", "at" or "from" up to the next sentence terminator.
pub fn extract_location(message: &str) -> Option<String> {
    let caps = location_regex().captures(message)?;
    let location = caps.get(1)?.as_str().trim().trim_end_matches(',').trim();
    if location.is_empty() {
        None
    } else {
        Some(location.to_string())
    }
}

/// Lowercase, spaces to underscores.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

fn preserve_phrase_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)while\s+preserving\s+existing\s+data").expect("valid preserve phrase regex")
    })
}

/// Remove `PRESERVE_PHRASE` (any case) and collapse the whitespace left behind.
pub fn strip_preserve_phrase(text: &str) -> String {
    preserve_phrase_regex()
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
