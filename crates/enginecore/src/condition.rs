use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Comparison applied by a branch condition.
///
/// Operator names that this engine does not know deserialize into
/// [`BranchOperator::Unknown`] so the flow version still loads; the branch
/// step that uses it fails when evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchOperator {
    TextContains,
    TextDoesNotContain,
    TextExactlyMatches,
    TextDoesNotExactlyMatch,
    TextStartWith,
    TextDoesNotStartWith,
    TextEndsWith,
    TextDoesNotEndWith,
    NumberIsGreaterThan,
    NumberIsLessThan,
    BooleanIsTrue,
    BooleanIsFalse,
    Exists,
    DoesNotExist,
    Unknown(String),
}

impl BranchOperator {
    pub const ALL: [BranchOperator; 14] = [
        BranchOperator::TextContains,
        BranchOperator::TextDoesNotContain,
        BranchOperator::TextExactlyMatches,
        BranchOperator::TextDoesNotExactlyMatch,
        BranchOperator::TextStartWith,
        BranchOperator::TextDoesNotStartWith,
        BranchOperator::TextEndsWith,
        BranchOperator::TextDoesNotEndWith,
        BranchOperator::NumberIsGreaterThan,
        BranchOperator::NumberIsLessThan,
        BranchOperator::BooleanIsTrue,
        BranchOperator::BooleanIsFalse,
        BranchOperator::Exists,
        BranchOperator::DoesNotExist,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            BranchOperator::TextContains => "TEXT_CONTAINS",
            BranchOperator::TextDoesNotContain => "TEXT_DOES_NOT_CONTAIN",
            BranchOperator::TextExactlyMatches => "TEXT_EXACTLY_MATCHES",
            BranchOperator::TextDoesNotExactlyMatch => "TEXT_DOES_NOT_EXACTLY_MATCH",
            BranchOperator::TextStartWith => "TEXT_START_WITH",
            BranchOperator::TextDoesNotStartWith => "TEXT_DOES_NOT_START_WITH",
            BranchOperator::TextEndsWith => "TEXT_ENDS_WITH",
            BranchOperator::TextDoesNotEndWith => "TEXT_DOES_NOT_END_WITH",
            BranchOperator::NumberIsGreaterThan => "NUMBER_IS_GREATER_THAN",
            BranchOperator::NumberIsLessThan => "NUMBER_IS_LESS_THAN",
            BranchOperator::BooleanIsTrue => "BOOLEAN_IS_TRUE",
            BranchOperator::BooleanIsFalse => "BOOLEAN_IS_FALSE",
            BranchOperator::Exists => "EXISTS",
            BranchOperator::DoesNotExist => "DOES_NOT_EXIST",
            BranchOperator::Unknown(name) => name,
        }
    }
}

impl From<&str> for BranchOperator {
    fn from(name: &str) -> Self {
        BranchOperator::ALL
            .iter()
            .find(|op| op.as_str() == name)
            .cloned()
            .unwrap_or_else(|| BranchOperator::Unknown(name.to_string()))
    }
}

impl fmt::Display for BranchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BranchOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BranchOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(BranchOperator::from(name.as_str()))
    }
}

/// One comparison inside a branch's condition groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCondition {
    #[serde(default)]
    pub first_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_value: Option<Value>,
    pub operator: BranchOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
}

impl BranchCondition {
    pub fn new(
        operator: BranchOperator,
        first_value: impl Into<Value>,
        second_value: impl Into<Value>,
    ) -> Self {
        Self {
            first_value: first_value.into(),
            second_value: Some(second_value.into()),
            operator,
            case_sensitive: None,
        }
    }

    pub fn single(operator: BranchOperator, first_value: impl Into<Value>) -> Self {
        Self {
            first_value: first_value.into(),
            second_value: None,
            operator,
            case_sensitive: None,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = Some(case_sensitive);
        self
    }
}
