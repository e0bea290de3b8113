//! Source declarations and document shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wrapping fields recognised when a source does not name one, in priority order.
pub const KNOWN_FIELDS: &[&str] = &["exercises", "foodfacts", "meals"];

/// A corpus source: a JSON file and, optionally, the field holding its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// File path, relative to the corpus base directory unless absolute.
    pub path: String,
    /// Field whose value holds the entries. `None` accepts any known shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl SourceSpec {
    pub fn new(path: impl Into<String>, field: Option<&str>) -> Self {
        Self {
            path: path.into(),
            field: field.map(str::to_string),
        }
    }
}

impl std::str::FromStr for SourceSpec {
    type Err = String;

    /// Parse `path` or `path:field`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Source path cannot be empty".to_string());
        }

        match s.rsplit_once(':') {
            Some((path, field))
                if !path.is_empty()
                    && !field.is_empty()
                    && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                Ok(Self::new(path, Some(field)))
            }
            _ => Ok(Self::new(s, None)),
        }
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}:{}", self.path, field),
            None => write!(f, "{}", self.path),
        }
    }
}

/// One entry pulled out of a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Mapping key the entry was stored under, if any.
    pub label: Option<String>,
    pub value: Value,
}

/// Entries extracted from one document, plus any non-fatal notes about it.
#[derive(Debug, Default)]
pub(crate) struct Extracted {
    pub entries: Vec<Entry>,
    pub warnings: Vec<String>,
}

/// Pull the entries out of a parsed document.
///
/// Errors describe why the document has no usable shape; the caller attaches
/// the source path.
pub(crate) fn extract_entries(
    document: Value,
    field: Option<&str>,
) -> std::result::Result<Extracted, String> {
    match (document, field) {
        (Value::Object(mut map), Some(field)) => {
            let inner = map
                .remove(field)
                .ok_or_else(|| format!("expected field '{}' is missing", field))?;
            Ok(Extracted {
                entries: entries_of(inner, field)?,
                warnings: Vec::new(),
            })
        }
        (_, Some(field)) => Err(format!(
            "expected a mapping with field '{}', found a list or scalar",
            field
        )),
        (Value::Array(items), None) => Ok(Extracted {
            entries: unlabeled(items),
            warnings: Vec::new(),
        }),
        (Value::Object(map), None) => extract_from_mapping(map),
        (other, None) => Err(format!("expected a list or mapping, found {}", kind(&other))),
    }
}

fn extract_from_mapping(mut map: Map<String, Value>) -> std::result::Result<Extracted, String> {
    let present: Vec<&str> = KNOWN_FIELDS
        .iter()
        .copied()
        .filter(|f| map.contains_key(*f))
        .collect();

    let Some(&chosen) = present.first() else {
        return Ok(Extracted {
            entries: labeled(map),
            warnings: Vec::new(),
        });
    };

    let mut warnings = Vec::new();
    if present.len() > 1 {
        warnings.push(format!(
            "several entry fields present ({}); using '{}'",
            present.join(", "),
            chosen
        ));
    }

    let inner = map.remove(chosen).unwrap_or(Value::Null);
    Ok(Extracted {
        entries: entries_of(inner, chosen)?,
        warnings,
    })
}

fn entries_of(value: Value, field: &str) -> std::result::Result<Vec<Entry>, String> {
    match value {
        Value::Array(items) => Ok(unlabeled(items)),
        Value::Object(map) => Ok(labeled(map)),
        other => Err(format!(
            "field '{}' must hold a list or mapping, found {}",
            field,
            kind(&other)
        )),
    }
}

fn unlabeled(items: Vec<Value>) -> Vec<Entry> {
    items
        .into_iter()
        .map(|value| Entry { label: None, value })
        .collect()
}

fn labeled(map: Map<String, Value>) -> Vec<Entry> {
    map.into_iter()
        .map(|(label, value)| Entry {
            label: Some(label),
            value,
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
