use serde::Serialize;
use tabula_core::FieldError;

use crate::error::DataError;

/// Declared type of a column. Submitted scalars are cast to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Bool,
    Array,
    Object,
    String,
}

impl ColumnType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(ColumnType::Int),
            "bool" | "boolean" => Some(ColumnType::Bool),
            "array" => Some(ColumnType::Array),
            "object" => Some(ColumnType::Object),
            "string" => Some(ColumnType::String),
            _ => None,
        }
    }
}

/// A single validation rule from the `rule:arg|rule:arg` DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    MaxLength(usize),
    MinLength(usize),
}

impl Rule {
    /// Parse a rule list such as `"minlength:2|maxlength:64"`.
    ///
    /// Empty segments are skipped; anything else that is not a known
    /// `name:number` pair is rejected.
    pub fn parse_list(dsl: &str) -> Result<Vec<Rule>, DataError> {
        dsl.split('|')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(Rule::parse)
            .collect()
    }

    pub fn parse(segment: &str) -> Result<Rule, DataError> {
        let (name, arg) = segment
            .split_once(':')
            .ok_or_else(|| DataError::Schema(format!("rule '{segment}' has no argument")))?;
        let arg: usize = arg
            .trim()
            .parse()
            .map_err(|_| DataError::Schema(format!("rule '{segment}' needs a numeric argument")))?;
        match name.trim().to_ascii_lowercase().as_str() {
            "maxlength" => Ok(Rule::MaxLength(arg)),
            "minlength" => Ok(Rule::MinLength(arg)),
            other => Err(DataError::Schema(format!("unknown validation rule '{other}'"))),
        }
    }

    /// Check `value` (already rendered as text) for `field`.
    pub fn check(&self, field: &str, value: &str) -> Option<FieldError> {
        let len = value.chars().count();
        match *self {
            Rule::MaxLength(max) if len > max => Some(FieldError::new(
                field,
                format!("Max length exceeded for {field}"),
                "maxlength",
            )),
            Rule::MinLength(min) if len < min => Some(FieldError::new(
                field,
                format!("{field} requires minimum length of {min}"),
                "minlength",
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub required: bool,
    pub rules: Vec<Rule>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: false,
            rules: Vec::new(),
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::String)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Bool)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach rules written in the `maxlength:N|minlength:N` DSL.
    pub fn rules(mut self, dsl: &str) -> Result<Self, DataError> {
        self.rules.extend(Rule::parse_list(dsl)?);
        Ok(self)
    }

    /// Required explicitly or carrying at least one rule.
    pub fn is_annotated(&self) -> bool {
        self.required || !self.rules.is_empty()
    }
}

/// Static configuration of one entity kind.
///
/// Built once when the repository is assembled and shared read-only
/// afterwards. The resource name is always explicit.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    pub name: String,
    pub id_field: String,
    pub columns: Vec<ColumnDefinition>,
    /// Columns never included in serialized output.
    pub hidden: Vec<String>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: "id".to_string(),
            columns: Vec::new(),
            hidden: Vec::new(),
        }
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_hidden(mut self, column: impl Into<String>) -> Self {
        self.hidden.push(column.into());
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True only for declared column names.
    pub fn can_filter(&self, key: &str) -> bool {
        self.column(key).is_some()
    }

    pub fn column_names(&self, blacklist: &[&str]) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| !blacklist.contains(name))
            .collect()
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden.iter().any(|h| h == column)
    }
}
