use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use serde::Deserialize;
use std::borrow::Cow;

use crate::data::Value;

/// Rendered for a missing date, i.e. an ongoing position.
pub const PRESENT: &str = "Present";

/// `{{uppercase field}}`
pub fn uppercase(value: &str) -> String {
    value.to_uppercase()
}

/// `{{join list ", "}}`: each item's `name` for records, the item itself
/// otherwise. Anything but a list joins to an empty string.
pub fn join(value: &Value<'_>, separator: &str) -> String {
    match value {
        Value::List(items) => items
            .iter()
            .map(Value::display_name)
            .collect::<Vec<_>>()
            .join(separator),
        _ => String::new(),
    }
}

/// `{{formatDate field}}`: `Jun 2022`, or `Present` when the date is absent.
///
/// Values that are not a recognizable date are passed through unchanged.
pub fn format_date(value: Option<&str>) -> String {
    let raw = match value.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return PRESENT.to_string(),
    };
    match parse_date(raw) {
        Some(date) => date.format("%b %Y").to_string(),
        None => {
            debug!("Not a date, rendering verbatim: {:?}", raw);
            raw.to_string()
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
        return Some(date);
    }
    // A bare year reads as January of that year.
    if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse().ok().and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }
    None
}

/// How `{{ ... }}` output is escaped. Triple-stash output is always raw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    /// Handlebars-compatible HTML entity escaping.
    #[default]
    Html,
    /// Escapes LaTeX special characters.
    Latex,
    None,
}

impl EscapeMode {
    pub fn apply<'a>(self, text: &'a str) -> Cow<'a, str> {
        match self {
            EscapeMode::Html => escape_html(text),
            EscapeMode::Latex => escape_latex(text),
            EscapeMode::None => Cow::Borrowed(text),
        }
    }
}

pub fn escape_html(text: &str) -> Cow<'_, str> {
    escape_with(text, |c| match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#x27;"),
        '`' => Some("&#x60;"),
        '=' => Some("&#x3D;"),
        _ => None,
    })
}

pub fn escape_latex(text: &str) -> Cow<'_, str> {
    escape_with(text, |c| match c {
        '\\' => Some("\\textbackslash{}"),
        '&' => Some("\\&"),
        '%' => Some("\\%"),
        '$' => Some("\\$"),
        '#' => Some("\\#"),
        '_' => Some("\\_"),
        '{' => Some("\\{"),
        '}' => Some("\\}"),
        '~' => Some("\\textasciitilde{}"),
        '^' => Some("\\textasciicircum{}"),
        _ => None,
    })
}

fn escape_with(text: &str, replacement: impl Fn(char) -> Option<&'static str>) -> Cow<'_, str> {
    if !text.chars().any(|c| replacement(c).is_some()) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match replacement(c) {
            Some(entity) => escaped.push_str(entity),
            None => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
