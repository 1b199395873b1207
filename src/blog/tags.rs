// Boundary parsing for form-encoded post fields
use thiserror::Error;

use crate::blog::domain::dedupe_tags;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTags(pub Vec<String>);

impl ParsedTags {
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagParseError {
    #[error("Tags must be a JSON array of strings: {0}")]
    MalformedJson(String),

    #[error("Tags must not be empty strings")]
    EmptyTag,
}

/// Parse the `tags` form field.
///
/// Accepts either a JSON array of strings (`["rust","web"]`) or a
/// comma-separated list (`rust, web`). Entries are trimmed, blanks in the
/// comma form are dropped, and duplicates collapse to the first occurrence.
pub fn parse_tags(raw: &str) -> Result<ParsedTags, TagParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(ParsedTags::default());
    }

    let tags = if raw.starts_with('[') {
        let items: Vec<String> = serde_json::from_str(raw)
            .map_err(|e| TagParseError::MalformedJson(e.to_string()))?;
        let items: Vec<String> = items.into_iter().map(|t| t.trim().to_string()).collect();
        if items.iter().any(|t| t.is_empty()) {
            return Err(TagParseError::EmptyTag);
        }
        items
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };

    Ok(ParsedTags(dedupe_tags(tags)))
}

/// Form booleans arrive as text; only the literal `"true"` is true.
pub fn parse_flag(raw: &str) -> bool {
    raw.trim() == "true"
}
