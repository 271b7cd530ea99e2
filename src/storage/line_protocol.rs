//! Line protocol parsing for the write path.
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...] [timestamp]
//! ```
//!
//! Every field of a line becomes its own series, keyed as
//! `measurement,tag=value(sorted)\tfield`.

use crate::predicate::{FIELD_IDENT, MEASUREMENT_IDENT};
use crate::{Error, Result};

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    String(String),
}

impl FieldValue {
    pub fn data_type(&self) -> SeriesDataType {
        match self {
            FieldValue::I64(_) => SeriesDataType::I64,
            FieldValue::U64(_) => SeriesDataType::U64,
            FieldValue::F64(_) => SeriesDataType::F64,
            FieldValue::Bool(_) => SeriesDataType::Bool,
            FieldValue::String(_) => SeriesDataType::String,
        }
    }
}

/// Value type of a series; fixed by its first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesDataType {
    I64,
    U64,
    F64,
    Bool,
    String,
}

impl SeriesDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesDataType::I64 => "integer",
            SeriesDataType::U64 => "unsigned",
            SeriesDataType::F64 => "float",
            SeriesDataType::Bool => "boolean",
            SeriesDataType::String => "string",
        }
    }
}

/// Identity of one series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub measurement: String,
    /// Sorted by tag key.
    pub tags: Vec<(String, String)>,
    pub field: String,
}

impl SeriesKey {
    /// `measurement,k=v,...\tfield`, with separators inside each part
    /// backslash-escaped so distinct series never share a key.
    pub fn to_key_string(&self) -> String {
        let mut key = String::with_capacity(self.measurement.len() + self.field.len() + 1);
        push_escaped(&mut key, &self.measurement);
        for (k, v) in &self.tags {
            key.push(',');
            push_escaped(&mut key, k);
            key.push('=');
            push_escaped(&mut key, v);
        }
        key.push('\t');
        push_escaped(&mut key, &self.field);
        key
    }

    /// Key/value pairs indexed for predicate evaluation, including the
    /// measurement and field pseudo-tags.
    pub fn index_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once((MEASUREMENT_IDENT, self.measurement.as_str()))
            .chain(self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .chain(std::iter::once((FIELD_IDENT, self.field.as_str())))
    }
}

/// One value of one series at one time.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub key: SeriesKey,
    pub time: i64,
    pub value: FieldValue,
}

/// A parsed line before it is split into per-field points.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    pub timestamp: Option<i64>,
}

impl ParsedLine {
    /// Split into one point per field; lines without a timestamp get
    /// `default_time`.
    pub fn into_points(self, default_time: i64) -> Vec<SeriesPoint> {
        let time = self.timestamp.unwrap_or(default_time);
        let measurement = self.measurement;
        let tags = self.tags;
        self.fields
            .into_iter()
            .map(|(field, value)| SeriesPoint {
                key: SeriesKey {
                    measurement: measurement.clone(),
                    tags: tags.clone(),
                    field,
                },
                time,
                value,
            })
            .collect()
    }
}

/// Parse a full write body. Blank lines and `#` comments are skipped; any
/// malformed line rejects the whole body.
pub fn parse_lines(body: &str) -> Result<Vec<ParsedLine>> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(idx, line)| {
            parse_line(line.trim()).map_err(|message| Error::LineProtocol {
                line: idx + 1,
                message,
            })
        })
        .collect()
}

/// Parse a body and flatten it into points.
pub fn parse_points(body: &str, default_time: i64) -> Result<Vec<SeriesPoint>> {
    Ok(parse_lines(body)?
        .into_iter()
        .flat_map(|line| line.into_points(default_time))
        .collect())
}

fn parse_line(line: &str) -> std::result::Result<ParsedLine, String> {
    let sections: Vec<&str> = split_unescaped(line, ' ')
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if sections.len() < 2 || sections.len() > 3 {
        return Err(format!(
            "expected 'series fields [timestamp]', found {} sections",
            sections.len()
        ));
    }

    let mut series = split_unescaped(sections[0], ',').into_iter();
    let measurement = unescape(series.next().unwrap_or_default());
    if measurement.is_empty() {
        return Err("missing measurement".to_string());
    }

    let mut tags = Vec::new();
    for tag in series {
        let (key, value) = split_pair(tag).ok_or_else(|| format!("invalid tag '{}'", tag))?;
        if key == MEASUREMENT_IDENT || key == FIELD_IDENT {
            return Err(format!("tag key '{}' is reserved", key));
        }
        if tags.iter().any(|(k, _): &(String, String)| *k == key) {
            return Err(format!("duplicate tag key '{}'", key));
        }
        tags.push((key, unescape(&value)));
    }
    tags.sort();

    let mut fields = Vec::new();
    for field in split_unescaped(sections[1], ',') {
        let (key, raw) = split_pair(field).ok_or_else(|| format!("invalid field '{}'", field))?;
        let value = parse_field_value(&raw)
            .ok_or_else(|| format!("invalid value '{}' for field '{}'", raw, key))?;
        fields.push((key, value));
    }

    let timestamp = match sections.get(2) {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))?,
        ),
        None => None,
    };

    Ok(ParsedLine {
        measurement,
        tags,
        fields,
        timestamp,
    })
}

/// Split `key=value`; both sides must be non-empty. The value keeps its
/// escapes and quotes for the caller.
fn split_pair(s: &str) -> Option<(String, String)> {
    let parts = split_unescaped(s, '=');
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    Some((unescape(parts[0]), parts[1].to_string()))
}

fn parse_field_value(raw: &str) -> Option<FieldValue> {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Some(FieldValue::String(unescape(&raw[1..raw.len() - 1])));
    }
    if let Some(int) = raw.strip_suffix('i') {
        return int.parse().ok().map(FieldValue::I64);
    }
    if let Some(uint) = raw.strip_suffix('u') {
        return uint.parse().ok().map(FieldValue::U64);
    }
    match raw {
        "t" | "T" | "true" | "True" | "TRUE" => return Some(FieldValue::Bool(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Some(FieldValue::Bool(false)),
        _ => {}
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(FieldValue::F64)
}

/// Split on `sep` where it is neither backslash-escaped nor inside a
/// double-quoted string.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut in_quotes = false;

    for (idx, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn push_escaped(out: &mut String, part: &str) {
    for c in part.chars() {
        if matches!(c, ',' | ' ' | '=' | '\\' | '\t') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ',' | ' ' | '=' | '"' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
