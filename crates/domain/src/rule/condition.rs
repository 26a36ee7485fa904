//! Condition — a predicate over the page context that must hold for a
//! triggered rule to run.
//!
//! Evaluation fails closed: an unknown condition type or operator, a
//! missing actual value, or an invalid `matches` pattern all yield `false`.

use serde::{Deserialize, Serialize};

use crate::pattern::matches_regex;

/// A guard evaluated after the trigger fires. All conditions of a rule
/// must be satisfied (logical AND).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    /// When `false`, string comparisons ignore case.
    #[serde(default, alias = "caseSensitive")]
    pub case_sensitive: bool,
}

/// Which fact of the page a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionKind {
    /// The full URL.
    Url,
    /// The URL host.
    Domain,
    /// The page classification.
    PageType,
    /// Presence of an element matching the selector in `value`.
    Element,
    /// Any type this version does not understand.
    #[serde(other)]
    Unknown,
}

/// How the actual value is compared against the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    /// `value` is a regular expression source, searched in the actual value.
    Matches,
    Exists,
    #[serde(rename = "not_exists")]
    NotExists,
    #[serde(other)]
    Unknown,
}

impl Condition {
    #[must_use]
    pub fn new(kind: ConditionKind, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            kind,
            operator,
            value: value.into(),
            case_sensitive: false,
        }
    }

    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Compare a resolved actual value against this condition's expectation.
    #[must_use]
    pub fn compare(&self, actual: Option<&str>) -> bool {
        self.operator.compare(actual, &self.value, self.case_sensitive)
    }
}

impl Operator {
    /// Apply the operator to `actual` and `expected`.
    #[must_use]
    pub fn compare(self, actual: Option<&str>, expected: &str, case_sensitive: bool) -> bool {
        match self {
            Self::Exists => return actual.is_some_and(|value| !value.is_empty()),
            Self::NotExists => return actual.is_none_or(str::is_empty),
            Self::Matches => {
                return actual.is_some_and(|value| matches_regex(expected, value, !case_sensitive));
            }
            Self::Unknown => return false,
            Self::Equals | Self::Contains | Self::StartsWith | Self::EndsWith => {}
        }

        let Some(actual) = actual else {
            return false;
        };
        let (actual, expected) = if case_sensitive {
            (actual.to_string(), expected.to_string())
        } else {
            (actual.to_lowercase(), expected.to_lowercase())
        };

        match self {
            Self::Equals => actual == expected,
            Self::Contains => actual.contains(&expected),
            Self::StartsWith => actual.starts_with(&expected),
            Self::EndsWith => actual.ends_with(&expected),
            Self::Matches | Self::Exists | Self::NotExists | Self::Unknown => false,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {:?} '{}'", self.kind, self.operator, self.value)
    }
}
