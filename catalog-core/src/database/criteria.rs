//! Search criteria
//!
//! Declarative conditions the UI builds and the repository evaluates.
//! Every key family has its own operator set, so an operator that does
//! not apply to a key cannot be expressed.

use super::models::Id;
use crate::config::IMG_EXTENSIONS;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// File attributes a criterion can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchKey {
    Name,
    AbsolutePath,
    Tags,
    Extension,
    Size,
    Width,
    Height,
    DateAdded,
}

impl SearchKey {
    pub const ALL: [SearchKey; 8] = [
        SearchKey::Name,
        SearchKey::AbsolutePath,
        SearchKey::Tags,
        SearchKey::Extension,
        SearchKey::Size,
        SearchKey::Width,
        SearchKey::Height,
        SearchKey::DateAdded,
    ];

    /// Operators that are legal for this key
    pub fn operators(self) -> &'static [OperatorType] {
        use OperatorType::*;
        match self {
            SearchKey::Name | SearchKey::AbsolutePath => &[
                Equals,
                NotEqual,
                Contains,
                NotContains,
                StartsWith,
                NotStartsWith,
            ],
            SearchKey::Size | SearchKey::Width | SearchKey::Height | SearchKey::DateAdded => &[
                Equals,
                NotEqual,
                SmallerThan,
                SmallerThanOrEquals,
                GreaterThan,
                GreaterThanOrEquals,
            ],
            SearchKey::Extension => &[Equals, NotEqual],
            SearchKey::Tags => &[
                Contains,
                NotContains,
                ContainsRecursively,
                NotContainsRecursively,
            ],
        }
    }

    /// JSON property of the file document this key reads
    pub fn property(self) -> &'static str {
        match self {
            SearchKey::Name => "name",
            SearchKey::AbsolutePath => "absolutePath",
            SearchKey::Tags => "tags",
            SearchKey::Extension => "extension",
            SearchKey::Size => "size",
            SearchKey::Width => "width",
            SearchKey::Height => "height",
            SearchKey::DateAdded => "dateAdded",
        }
    }
}

/// Union of every operator name, used when listing what a key accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperatorType {
    Equals,
    NotEqual,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    SmallerThan,
    SmallerThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    ContainsRecursively,
    NotContainsRecursively,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextKey {
    Name,
    AbsolutePath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberKey {
    Size,
    Width,
    Height,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateKey {
    DateAdded,
}

impl From<TextKey> for SearchKey {
    fn from(key: TextKey) -> Self {
        match key {
            TextKey::Name => SearchKey::Name,
            TextKey::AbsolutePath => SearchKey::AbsolutePath,
        }
    }
}

impl From<NumberKey> for SearchKey {
    fn from(key: NumberKey) -> Self {
        match key {
            NumberKey::Size => SearchKey::Size,
            NumberKey::Width => SearchKey::Width,
            NumberKey::Height => SearchKey::Height,
        }
    }
}

impl From<DateKey> for SearchKey {
    fn from(key: DateKey) -> Self {
        match key {
            DateKey::DateAdded => SearchKey::DateAdded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StringOperator {
    Equals,
    NotEqual,
    /// Case-insensitive substring match
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberOperator {
    Equals,
    NotEqual,
    SmallerThan,
    SmallerThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOperator {
    Equals,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagOperator {
    Contains,
    NotContains,
    /// Matches the tag or any of its descendants
    ContainsRecursively,
    NotContainsRecursively,
}

impl TagOperator {
    pub fn is_recursive(self) -> bool {
        matches!(
            self,
            TagOperator::ContainsRecursively | TagOperator::NotContainsRecursively
        )
    }

    pub fn is_negated(self) -> bool {
        matches!(
            self,
            TagOperator::NotContains | TagOperator::NotContainsRecursively
        )
    }
}

impl From<StringOperator> for OperatorType {
    fn from(op: StringOperator) -> Self {
        match op {
            StringOperator::Equals => OperatorType::Equals,
            StringOperator::NotEqual => OperatorType::NotEqual,
            StringOperator::Contains => OperatorType::Contains,
            StringOperator::NotContains => OperatorType::NotContains,
            StringOperator::StartsWith => OperatorType::StartsWith,
            StringOperator::NotStartsWith => OperatorType::NotStartsWith,
        }
    }
}

impl From<NumberOperator> for OperatorType {
    fn from(op: NumberOperator) -> Self {
        match op {
            NumberOperator::Equals => OperatorType::Equals,
            NumberOperator::NotEqual => OperatorType::NotEqual,
            NumberOperator::SmallerThan => OperatorType::SmallerThan,
            NumberOperator::SmallerThanOrEquals => OperatorType::SmallerThanOrEquals,
            NumberOperator::GreaterThan => OperatorType::GreaterThan,
            NumberOperator::GreaterThanOrEquals => OperatorType::GreaterThanOrEquals,
        }
    }
}

impl From<BinaryOperator> for OperatorType {
    fn from(op: BinaryOperator) -> Self {
        match op {
            BinaryOperator::Equals => OperatorType::Equals,
            BinaryOperator::NotEqual => OperatorType::NotEqual,
        }
    }
}

impl From<TagOperator> for OperatorType {
    fn from(op: TagOperator) -> Self {
        match op {
            TagOperator::Contains => OperatorType::Contains,
            TagOperator::NotContains => OperatorType::NotContains,
            TagOperator::ContainsRecursively => OperatorType::ContainsRecursively,
            TagOperator::NotContainsRecursively => OperatorType::NotContainsRecursively,
        }
    }
}

/// One search condition on a file attribute.
///
/// Sizes are in bytes. Dates compare at (UTC) day granularity.
/// A tag criterion with no value stands for "untagged".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "valueType", rename_all = "camelCase")]
pub enum Criteria {
    #[serde(rename = "string")]
    Text {
        key: TextKey,
        operator: StringOperator,
        value: String,
    },
    Number {
        key: NumberKey,
        operator: NumberOperator,
        value: f64,
    },
    Date {
        key: DateKey,
        operator: NumberOperator,
        value: NaiveDate,
    },
    Extension {
        operator: BinaryOperator,
        value: String,
    },
    #[serde(rename = "array")]
    Tags {
        operator: TagOperator,
        value: Option<Id>,
    },
}

impl Criteria {
    /// The condition a user starts from when adding a criterion on `key`
    pub fn default_for(key: SearchKey) -> Self {
        match key {
            SearchKey::Name => Criteria::text(TextKey::Name, StringOperator::Contains, ""),
            SearchKey::AbsolutePath => {
                Criteria::text(TextKey::AbsolutePath, StringOperator::Contains, "")
            }
            SearchKey::Tags => Criteria::Tags {
                operator: TagOperator::Contains,
                value: None,
            },
            SearchKey::Extension => Criteria::Extension {
                operator: BinaryOperator::Equals,
                value: IMG_EXTENSIONS[0].to_string(),
            },
            SearchKey::DateAdded => Criteria::Date {
                key: DateKey::DateAdded,
                operator: NumberOperator::Equals,
                value: Utc::now().date_naive(),
            },
            SearchKey::Size => {
                Criteria::number(NumberKey::Size, NumberOperator::GreaterThanOrEquals, 0.0)
            }
            SearchKey::Width => {
                Criteria::number(NumberKey::Width, NumberOperator::GreaterThanOrEquals, 0.0)
            }
            SearchKey::Height => {
                Criteria::number(NumberKey::Height, NumberOperator::GreaterThanOrEquals, 0.0)
            }
        }
    }

    pub fn text(key: TextKey, operator: StringOperator, value: impl Into<String>) -> Self {
        Criteria::Text {
            key,
            operator,
            value: value.into(),
        }
    }

    pub fn number(key: NumberKey, operator: NumberOperator, value: f64) -> Self {
        Criteria::Number {
            key,
            operator,
            value,
        }
    }

    pub fn date(operator: NumberOperator, value: NaiveDate) -> Self {
        Criteria::Date {
            key: DateKey::DateAdded,
            operator,
            value,
        }
    }

    pub fn extension(operator: BinaryOperator, value: impl Into<String>) -> Self {
        Criteria::Extension {
            operator,
            value: value.into(),
        }
    }

    pub fn tag(operator: TagOperator, value: Option<Id>) -> Self {
        Criteria::Tags { operator, value }
    }

    pub fn key(&self) -> SearchKey {
        match self {
            Criteria::Text { key, .. } => (*key).into(),
            Criteria::Number { key, .. } => (*key).into(),
            Criteria::Date { key, .. } => (*key).into(),
            Criteria::Extension { .. } => SearchKey::Extension,
            Criteria::Tags { .. } => SearchKey::Tags,
        }
    }

    pub fn operator(&self) -> OperatorType {
        match self {
            Criteria::Text { operator, .. } => (*operator).into(),
            Criteria::Number { operator, .. } | Criteria::Date { operator, .. } => {
                (*operator).into()
            }
            Criteria::Extension { operator, .. } => (*operator).into(),
            Criteria::Tags { operator, .. } => (*operator).into(),
        }
    }

    /// Whether evaluating this criterion needs the tag tree
    pub fn is_recursive(&self) -> bool {
        matches!(self, Criteria::Tags { operator, value: Some(_) } if operator.is_recursive())
    }
}

/// Scalar value of an exact-match condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Exact-match condition on any entity field, used for counts and cascades
#[derive(Debug, Clone, PartialEq)]
pub enum Condition<F> {
    /// Field equals the value
    Equals(F, Value),
    /// Text field starts with the prefix (case-sensitive)
    StartsWith(F, String),
    /// Array field shares at least one element with the list.
    /// An empty list matches documents whose array is empty.
    Contains(F, Vec<Value>),
}

impl<F> Condition<F> {
    /// Array field contains any of the given IDs
    pub fn contains_any<I, V>(field: F, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Condition::Contains(field, values.into_iter().map(Into::into).collect())
    }
}
