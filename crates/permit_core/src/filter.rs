use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PolicyError;

/// Comparison operator of a leaf predicate, spelled the way the backend
/// expects it on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparison {
    #[serde(rename = "_eq")]
    Eq,
    #[serde(rename = "_neq")]
    Neq,
    #[serde(rename = "_in")]
    In,
    #[serde(rename = "_nin")]
    Nin,
    #[serde(rename = "_gt")]
    Gt,
    #[serde(rename = "_lt")]
    Lt,
    #[serde(rename = "_gte")]
    Gte,
    #[serde(rename = "_lte")]
    Lte,
    #[serde(rename = "_like")]
    Like,
    #[serde(rename = "_nlike")]
    Nlike,
    #[serde(rename = "_ilike")]
    Ilike,
    #[serde(rename = "_nilike")]
    Nilike,
    #[serde(rename = "_similar")]
    Similar,
    #[serde(rename = "_nsimilar")]
    Nsimilar,
    #[serde(rename = "_regex")]
    Regex,
    #[serde(rename = "_iregex")]
    Iregex,
    #[serde(rename = "_nregex")]
    Nregex,
    #[serde(rename = "_niregex")]
    Niregex,
    #[serde(rename = "_ceq")]
    Ceq,
    #[serde(rename = "_cne")]
    Cne,
    #[serde(rename = "_cgt")]
    Cgt,
    #[serde(rename = "_clt")]
    Clt,
    #[serde(rename = "_cgte")]
    Cgte,
    #[serde(rename = "_clte")]
    Clte,
    #[serde(rename = "_is_null")]
    IsNull,
    #[serde(rename = "_contains")]
    Contains,
    #[serde(rename = "_contained_in")]
    ContainedIn,
    #[serde(rename = "_has_key")]
    HasKey,
    #[serde(rename = "_has_keys_any")]
    HasKeysAny,
    #[serde(rename = "_has_keys_all")]
    HasKeysAll,
}

impl Comparison {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Comparison::Eq => "_eq",
            Comparison::Neq => "_neq",
            Comparison::In => "_in",
            Comparison::Nin => "_nin",
            Comparison::Gt => "_gt",
            Comparison::Lt => "_lt",
            Comparison::Gte => "_gte",
            Comparison::Lte => "_lte",
            Comparison::Like => "_like",
            Comparison::Nlike => "_nlike",
            Comparison::Ilike => "_ilike",
            Comparison::Nilike => "_nilike",
            Comparison::Similar => "_similar",
            Comparison::Nsimilar => "_nsimilar",
            Comparison::Regex => "_regex",
            Comparison::Iregex => "_iregex",
            Comparison::Nregex => "_nregex",
            Comparison::Niregex => "_niregex",
            Comparison::Ceq => "_ceq",
            Comparison::Cne => "_cne",
            Comparison::Cgt => "_cgt",
            Comparison::Clt => "_clt",
            Comparison::Cgte => "_cgte",
            Comparison::Clte => "_clte",
            Comparison::IsNull => "_is_null",
            Comparison::Contains => "_contains",
            Comparison::ContainedIn => "_contained_in",
            Comparison::HasKey => "_has_key",
            Comparison::HasKeysAny => "_has_keys_any",
            Comparison::HasKeysAll => "_has_keys_all",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        let op = match s {
            "_eq" => Comparison::Eq,
            "_neq" => Comparison::Neq,
            "_in" => Comparison::In,
            "_nin" => Comparison::Nin,
            "_gt" => Comparison::Gt,
            "_lt" => Comparison::Lt,
            "_gte" => Comparison::Gte,
            "_lte" => Comparison::Lte,
            "_like" => Comparison::Like,
            "_nlike" => Comparison::Nlike,
            "_ilike" => Comparison::Ilike,
            "_nilike" => Comparison::Nilike,
            "_similar" => Comparison::Similar,
            "_nsimilar" => Comparison::Nsimilar,
            "_regex" => Comparison::Regex,
            "_iregex" => Comparison::Iregex,
            "_nregex" => Comparison::Nregex,
            "_niregex" => Comparison::Niregex,
            "_ceq" => Comparison::Ceq,
            "_cne" => Comparison::Cne,
            "_cgt" => Comparison::Cgt,
            "_clt" => Comparison::Clt,
            "_cgte" => Comparison::Cgte,
            "_clte" => Comparison::Clte,
            "_is_null" => Comparison::IsNull,
            "_contains" => Comparison::Contains,
            "_contained_in" => Comparison::ContainedIn,
            "_has_key" => Comparison::HasKey,
            "_has_keys_any" => Comparison::HasKeysAny,
            "_has_keys_all" => Comparison::HasKeysAll,
            _ => return None,
        };
        Some(op)
    }
}

/// Boolean connective of a group node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Connective {
    #[serde(rename = "_and")]
    And,
    #[serde(rename = "_or")]
    Or,
    #[serde(rename = "_not")]
    Not,
}

impl Connective {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Connective::And => "_and",
            Connective::Or => "_or",
            Connective::Not => "_not",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "_and" => Some(Connective::And),
            "_or" => Some(Connective::Or),
            "_not" => Some(Connective::Not),
            _ => None,
        }
    }
}

/// A leaf predicate: column, comparison operator, value. The column may
/// be a dot-joined relationship path (`author.name`). Identity is the
/// position in the owning group's rule list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub column: String,
    pub operator: Comparison,
    pub value: Value,
}

impl Rule {
    /// `_is_null` values are carried as the strings `"true"` / `"false"`;
    /// boolean inputs are normalized here so equality and round-trips are
    /// stable.
    pub fn new(column: impl Into<String>, operator: Comparison, value: Value) -> Self {
        let value = normalize_value(operator, value);
        Rule {
            column: column.into(),
            operator,
            value,
        }
    }

    /// The blank row appended by the editor; the empty column is allowed
    /// transiently and rejected at the save boundary.
    pub fn incomplete() -> Self {
        Rule {
            column: String::new(),
            operator: Comparison::Eq,
            value: Value::String(String::new()),
        }
    }
}

pub(crate) fn normalize_value(operator: Comparison, value: Value) -> Value {
    if operator == Comparison::IsNull {
        if let Value::Bool(b) = value {
            return Value::String(b.to_string());
        }
    }
    value
}

/// A node of the row filter: rules and nested subgroups combined with a
/// boolean connective. The empty `_and` group is the "always true"
/// sentinel; "no filter configured" is the absence of a group entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleGroup {
    pub connective: Connective,
    pub rules: Vec<Rule>,
    pub groups: Vec<RuleGroup>,
}

impl RuleGroup {
    pub fn empty() -> Self {
        RuleGroup {
            connective: Connective::And,
            rules: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn new(connective: Connective) -> Self {
        RuleGroup {
            connective,
            rules: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// What the editor starts from when the operator switches to a custom
    /// row check with no cached tree: one editable, intentionally
    /// incomplete rule row.
    pub fn default_editable() -> Self {
        RuleGroup {
            connective: Connective::And,
            rules: vec![Rule::incomplete()],
            groups: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.groups.is_empty()
    }

    pub fn add_rule(&mut self) {
        self.rules.push(Rule::incomplete());
    }

    pub fn remove_rule(&mut self, index: usize) -> Result<Rule, PolicyError> {
        if index >= self.rules.len() {
            return Err(PolicyError::RuleIndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        Ok(self.rules.remove(index))
    }

    pub fn add_group(&mut self) {
        self.groups.push(RuleGroup::empty());
    }

    pub fn remove_group(&mut self, index: usize) -> Result<RuleGroup, PolicyError> {
        if index >= self.groups.len() {
            return Err(PolicyError::GroupIndexOutOfRange {
                index,
                len: self.groups.len(),
            });
        }
        Ok(self.groups.remove(index))
    }

    fn child_count(&self) -> usize {
        self.rules.len() + self.groups.len()
    }

    /// A tree is well-formed when every leaf names a column and every
    /// negation node has at most one child. Only well-formed trees are
    /// guaranteed a lossless wire round-trip.
    pub fn well_formedness(&self) -> Result<(), PolicyError> {
        if self.connective == Connective::Not && self.child_count() > 1 {
            return Err(PolicyError::NegationArity {
                children: self.child_count(),
            });
        }
        for rule in &self.rules {
            if rule.column.is_empty() {
                return Err(PolicyError::EmptyRuleColumn);
            }
        }
        for group in &self.groups {
            group.well_formedness()?;
        }
        Ok(())
    }

    pub fn is_well_formed(&self) -> bool {
        self.well_formedness().is_ok()
    }

    /// Prefixes every leaf column in the subtree with a relationship
    /// path, used when a nested group is lifted out of a relationship
    /// object during deserialization.
    pub(crate) fn prefix_columns(&mut self, path: &str) {
        for rule in &mut self.rules {
            rule.column = format!("{}.{}", path, rule.column);
        }
        for group in &mut self.groups {
            group.prefix_columns(path);
        }
    }
}

impl Default for RuleGroup {
    fn default() -> Self {
        RuleGroup::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_group_is_the_sentinel() {
        let group = RuleGroup::empty();
        assert!(group.is_empty());
        assert_eq!(group.connective, Connective::And);
        assert!(group.is_well_formed());
    }

    #[test]
    fn default_editable_has_one_blank_rule() {
        let group = RuleGroup::default_editable();
        assert!(!group.is_empty());
        assert_eq!(group.rules.len(), 1);
        assert_eq!(group.rules[0].operator, Comparison::Eq);
        assert_eq!(group.rules[0].column, "");
        // Blank column is fine while editing, not at the save boundary.
        assert_eq!(group.well_formedness(), Err(PolicyError::EmptyRuleColumn));
    }

    #[test]
    fn add_and_remove_rules_by_index() {
        let mut group = RuleGroup::empty();
        group.add_rule();
        group.add_rule();
        group.rules[0].column = "title".to_string();
        group.rules[1].column = "author".to_string();

        let removed = group.remove_rule(0).unwrap();
        assert_eq!(removed.column, "title");
        assert_eq!(group.rules.len(), 1);
        assert_eq!(
            group.remove_rule(5),
            Err(PolicyError::RuleIndexOutOfRange { index: 5, len: 1 })
        );
        // The failed removal left the tree alone.
        assert_eq!(group.rules[0].column, "author");
    }

    #[test]
    fn add_and_remove_groups_by_index() {
        let mut group = RuleGroup::empty();
        group.add_group();
        assert_eq!(group.groups.len(), 1);
        assert_eq!(
            group.remove_group(1),
            Err(PolicyError::GroupIndexOutOfRange { index: 1, len: 1 })
        );
        group.remove_group(0).unwrap();
        assert!(group.is_empty());
    }

    #[test]
    fn is_null_booleans_are_stringified() {
        let rule = Rule::new("title", Comparison::IsNull, json!(true));
        assert_eq!(rule.value, json!("true"));
        let rule = Rule::new("title", Comparison::IsNull, json!("false"));
        assert_eq!(rule.value, json!("false"));
        // Other operators keep their value untouched.
        let rule = Rule::new("age", Comparison::Gt, json!(32));
        assert_eq!(rule.value, json!(32));
    }

    #[test]
    fn negation_with_two_children_is_malformed() {
        let mut group = RuleGroup::new(Connective::Not);
        group.rules.push(Rule::new("a", Comparison::Eq, json!("1")));
        group.rules.push(Rule::new("b", Comparison::Eq, json!("2")));
        assert_eq!(
            group.well_formedness(),
            Err(PolicyError::NegationArity { children: 2 })
        );
    }

    #[test]
    fn well_formedness_recurses_into_subgroups() {
        let mut group = RuleGroup::empty();
        group.add_group();
        group.groups[0].add_rule();
        assert!(!group.is_well_formed());
        group.groups[0].rules[0].column = "title".to_string();
        assert!(group.is_well_formed());
    }

    #[test]
    fn comparison_wire_spellings_round_trip() {
        for op in [
            Comparison::Eq,
            Comparison::IsNull,
            Comparison::ContainedIn,
            Comparison::HasKeysAll,
            Comparison::Niregex,
        ] {
            assert_eq!(Comparison::from_wire(op.as_wire()), Some(op));
        }
        assert_eq!(Comparison::from_wire("_exists"), None);
    }
}
