use std::fmt;

use crate::state::Action;

/// Rejection raised at a mutation or validation boundary. The attempted
/// edit is a no-op; the state it targeted is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    RuleIndexOutOfRange { index: usize, len: usize },
    GroupIndexOutOfRange { index: usize, len: usize },
    PresetIndexOutOfRange { index: usize, len: usize },
    DuplicatePresetColumn(String),
    PresetLimitReached { total_columns: usize },
    UnknownColumn(String),
    EmptyRuleColumn,
    NegationArity { children: usize },
    AggregationsDisabled,
    NotApplicable { action: Action, operation: &'static str },
    Canonical(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::RuleIndexOutOfRange { index, len } => {
                write!(f, "rule index {} out of range (group has {} rules)", index, len)
            }
            PolicyError::GroupIndexOutOfRange { index, len } => {
                write!(f, "group index {} out of range (group has {} subgroups)", index, len)
            }
            PolicyError::PresetIndexOutOfRange { index, len } => {
                write!(f, "preset index {} out of range ({} presets)", index, len)
            }
            PolicyError::DuplicatePresetColumn(column) => {
                write!(f, "column '{}' is already used by another preset", column)
            }
            PolicyError::PresetLimitReached { total_columns } => {
                write!(f, "cannot add preset: table only has {} columns", total_columns)
            }
            PolicyError::UnknownColumn(column) => {
                write!(f, "unknown column '{}'", column)
            }
            PolicyError::EmptyRuleColumn => {
                write!(f, "rule has an empty column")
            }
            PolicyError::NegationArity { children } => {
                write!(f, "negation group must have at most one child, found {}", children)
            }
            PolicyError::AggregationsDisabled => {
                write!(f, "aggregate root fields require aggregation permission")
            }
            PolicyError::NotApplicable { action, operation } => {
                write!(f, "'{}' does not apply to the {} action", operation, action.as_str())
            }
            PolicyError::Canonical(message) => {
                write!(f, "canonical encoding: {}", message)
            }
        }
    }
}

impl std::error::Error for PolicyError {}

/// Failure while decoding an external boolean-expression payload.
/// `path` identifies the offending node in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeError {
    pub message: String,
    pub path: String,
}

impl DeserializeError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid permission expression at {}: {}", self.path, self.message)
    }
}

impl std::error::Error for DeserializeError {}
