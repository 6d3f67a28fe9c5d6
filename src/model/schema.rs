use crate::error::{Error, Result};
use crate::model::value::{FieldKind, FieldValue};

/// Static description of one entity field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub editable: bool,
    /// Shown as a table column.
    pub column: bool,
    pub width: u16,
    /// Closed set of accepted values; empty means free input.
    pub choices: &'static [&'static str],
    /// Write-only; rendered masked and never read back from the server.
    pub secret: bool,
}

impl FieldSpec {
    pub const fn column(name: &'static str, label: &'static str, kind: FieldKind, width: u16) -> Self {
        Self {
            name,
            label,
            kind,
            editable: true,
            column: true,
            width,
            choices: &[],
            secret: false,
        }
    }

    pub const fn with_choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub const fn hidden(mut self) -> Self {
        self.column = false;
        self
    }

    pub const fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SelectorSource {
    /// Options are a known closed set.
    Fixed(&'static [&'static str]),
    /// Options are the distinct values present in the collection.
    Distinct,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectorSpec {
    pub field: &'static str,
    pub label: &'static str,
    pub source: SelectorSource,
}

#[derive(Debug)]
pub struct Schema {
    pub fields: &'static [FieldSpec],
    pub searchable: &'static [&'static str],
    pub selectors: &'static [SelectorSpec],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|spec| spec.column)
    }

    pub fn editable(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|spec| spec.editable)
    }

    pub fn selector(&self, field: &str) -> Option<&SelectorSpec> {
        self.selectors.iter().find(|spec| spec.field == field)
    }

    /// Parses raw user input for `field`, refusing unknown or read-only fields.
    pub fn parse_value(&self, field: &str, raw: &str) -> Result<FieldValue> {
        let spec = self
            .field(field)
            .ok_or_else(|| Error::validation(format!("unknown field '{field}'")))?;
        if !spec.editable {
            return Err(Error::validation(format!("field '{field}' is read-only")));
        }
        let value = spec.kind.parse(raw)?;
        if let FieldValue::Text(text) = &value {
            if !spec.choices.is_empty() && !spec.choices.contains(&text.as_str()) {
                return Err(Error::validation(format!(
                    "'{text}' is not one of: {}",
                    spec.choices.join(", ")
                )));
            }
        }
        Ok(value)
    }
}
