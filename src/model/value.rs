use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::error::{Error, Result};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    /// `YYYY-MM-DD`, or empty for "no date".
    Date,
}

/// A single primitive cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(i64),
    Bool(bool),
    Date(String),
}

impl FieldKind {
    /// Parses user input into a value of this kind.
    pub fn parse(self, raw: &str) -> Result<FieldValue> {
        let trimmed = raw.trim();
        match self {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Number => trimmed
                .parse::<i64>()
                .map(FieldValue::Number)
                .map_err(|_| Error::validation(format!("'{trimmed}' is not a whole number"))),
            FieldKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "active" | "on" => Ok(FieldValue::Bool(true)),
                "false" | "no" | "n" | "0" | "inactive" | "off" => Ok(FieldValue::Bool(false)),
                _ => Err(Error::validation(format!("'{trimmed}' is not true/false"))),
            },
            FieldKind::Date => {
                if trimmed.is_empty() {
                    return Ok(FieldValue::Null);
                }
                Date::parse(trimmed, DATE_FORMAT)
                    .map(|_| FieldValue::Date(trimmed.to_string()))
                    .map_err(|_| Error::validation(format!("'{trimmed}' is not a YYYY-MM-DD date")))
            }
        }
    }
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn optional_text(value: Option<&str>) -> Self {
        value.map(FieldValue::text).unwrap_or(FieldValue::Null)
    }

    pub fn optional_date(value: Option<&str>) -> Self {
        match value {
            Some(date) if !date.is_empty() => FieldValue::Date(date.to_string()),
            _ => FieldValue::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(text) | FieldValue::Date(text) => Value::String(text.clone()),
            FieldValue::Number(number) => Value::from(*number),
            FieldValue::Bool(flag) => Value::Bool(*flag),
        }
    }

    /// Case-insensitive substring match; `needle` must already be lowercase.
    pub fn contains_lowercase(&self, needle: &str) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Text(text) | FieldValue::Date(text) => text.to_lowercase().contains(needle),
            other => other.to_string().contains(needle),
        }
    }

    /// Equality against a selector value as shown in a drop-down.
    pub fn matches_selector(&self, selected: &str) -> bool {
        match self {
            FieldValue::Null => selected.is_empty(),
            FieldValue::Text(text) | FieldValue::Date(text) => text == selected,
            FieldValue::Number(number) => number.to_string() == selected,
            FieldValue::Bool(flag) => {
                let word = if *flag { "active" } else { "inactive" };
                selected.eq_ignore_ascii_case(word) || selected == flag.to_string()
            }
        }
    }

    /// Ordering used by column sorts. Missing values sort first; numbers
    /// compare numerically and text compares with [`locale_cmp`].
    pub fn sort_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Less,
            (_, FieldValue::Null) => Ordering::Greater,
            (FieldValue::Number(a), FieldValue::Number(b)) => a.cmp(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (a, b) => locale_cmp(&a.to_string(), &b.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(text) | FieldValue::Date(text) => f.write_str(text),
            FieldValue::Number(number) => write!(f, "{number}"),
            FieldValue::Bool(flag) => f.write_str(if *flag { "yes" } else { "no" }),
        }
    }
}

/// Human ordering for text: case-folded comparison first, ordinal second so
/// that the result is total and deterministic.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_numbers_and_rejects_garbage() {
        assert_eq!(FieldKind::Number.parse(" 15 ").unwrap(), FieldValue::Number(15));
        assert_matches!(FieldKind::Number.parse("fifteen"), Err(Error::Validation(_)));
    }

    #[test]
    fn parses_status_words_as_bool() {
        assert_eq!(FieldKind::Bool.parse("Inactive").unwrap(), FieldValue::Bool(false));
        assert_eq!(FieldKind::Bool.parse("yes").unwrap(), FieldValue::Bool(true));
    }

    #[test]
    fn empty_date_clears_the_field() {
        assert_eq!(FieldKind::Date.parse("").unwrap(), FieldValue::Null);
        assert_eq!(
            FieldKind::Date.parse("2024-03-09").unwrap(),
            FieldValue::Date("2024-03-09".into())
        );
        assert_matches!(FieldKind::Date.parse("09/03/2024"), Err(Error::Validation(_)));
        assert_matches!(FieldKind::Date.parse("2024-02-30"), Err(Error::Validation(_)));
    }

    #[test]
    fn locale_order_ignores_case_before_codepoints() {
        let mut names = vec!["bolt", "Axle", "cam", "Bolt"];
        names.sort_by(|a, b| locale_cmp(a, b));
        assert_eq!(names, vec!["Axle", "Bolt", "bolt", "cam"]);
    }

    #[test]
    fn nulls_sort_before_values() {
        assert_eq!(FieldValue::Null.sort_cmp(&FieldValue::Number(0)), Ordering::Less);
        assert_eq!(
            FieldValue::Number(9).sort_cmp(&FieldValue::Number(10)),
            Ordering::Less
        );
    }
}
