//! Conversion between the editable rule tree and the backend's declarative
//! boolean-expression payload.
//!
//! The wire shape is the nested `{_and|_or|_not: ...}` / `{column: {op:
//! value}}` object the backend consumes. Relationship predicates arrive as
//! nested objects (`{"author": {"name": {"_eq": ...}}}`) and are flattened
//! to dot-joined columns (`author.name`) on the way in; the serializer
//! expands them back. For every well-formed tree `g`,
//! `from_external(&to_external(&g)) == g`.

use serde_json::{Map, Value};

use crate::error::DeserializeError;
use crate::filter::{normalize_value, Comparison, Connective, Rule, RuleGroup};

/// Serializes a rule tree to the backend's boolean-expression shape. The
/// empty sentinel becomes `{}` (unrestricted). A top-level `_and` holding
/// a single rule collapses to its bare leaf, matching what the backend
/// itself emits for single-condition filters.
pub fn to_external(group: &RuleGroup) -> Value {
    if group.connective == Connective::And && group.is_empty() {
        return Value::Object(Map::new());
    }
    if group.connective == Connective::And && group.rules.len() == 1 && group.groups.is_empty() {
        return leaf_value(&group.rules[0]);
    }
    encode_group(group)
}

fn encode_group(group: &RuleGroup) -> Value {
    match group.connective {
        Connective::And | Connective::Or => {
            let mut items: Vec<Value> = group.rules.iter().map(leaf_value).collect();
            items.extend(group.groups.iter().map(encode_group));
            let mut node = Map::new();
            node.insert(group.connective.as_wire().to_string(), Value::Array(items));
            Value::Object(node)
        }
        Connective::Not => {
            let inner = if group.rules.len() == 1 && group.groups.is_empty() {
                leaf_value(&group.rules[0])
            } else if group.rules.is_empty() && group.groups.len() == 1 {
                encode_group(&group.groups[0])
            } else if group.is_empty() {
                Value::Object(Map::new())
            } else {
                // Not well-formed (a negation should have one child); the
                // extra children are normalized under a conjunction.
                let mut items: Vec<Value> = group.rules.iter().map(leaf_value).collect();
                items.extend(group.groups.iter().map(encode_group));
                let mut node = Map::new();
                node.insert("_and".to_string(), Value::Array(items));
                Value::Object(node)
            };
            let mut node = Map::new();
            node.insert("_not".to_string(), inner);
            Value::Object(node)
        }
    }
}

fn leaf_value(rule: &Rule) -> Value {
    let mut node = Map::new();
    node.insert(rule.operator.as_wire().to_string(), rule.value.clone());
    let mut value = Value::Object(node);
    for segment in rule.column.rsplit('.') {
        let mut wrapper = Map::new();
        wrapper.insert(segment.to_string(), value);
        value = Value::Object(wrapper);
    }
    value
}

enum Node {
    Rule(Rule),
    Group(RuleGroup),
}

/// Parses the backend's boolean-expression shape back into a rule tree.
/// `{}` yields the empty-true sentinel; a bare leaf (or an implicit
/// conjunction of several column keys) is wrapped in an `_and` group.
/// Unrecognized operators and `_exists` expressions are rejected with the
/// path of the offending node.
pub fn from_external(value: &Value) -> Result<RuleGroup, DeserializeError> {
    let obj = value
        .as_object()
        .ok_or_else(|| DeserializeError::new("expected an object", "$"))?;
    if obj.is_empty() {
        return Ok(RuleGroup::empty());
    }
    let nodes = parse_object(obj, "$")?;
    Ok(assemble(nodes))
}

/// Wraps a parsed node list into a single group. A lone group is used
/// directly; anything else becomes an implicit conjunction.
fn assemble(mut nodes: Vec<Node>) -> RuleGroup {
    if nodes.len() == 1 {
        if let Node::Group(_) = nodes[0] {
            match nodes.remove(0) {
                Node::Group(group) => return group,
                Node::Rule(_) => unreachable!(),
            }
        }
    }
    let mut group = RuleGroup::empty();
    for node in nodes {
        match node {
            Node::Rule(rule) => group.rules.push(rule),
            Node::Group(sub) => group.groups.push(sub),
        }
    }
    group
}

fn parse_object(obj: &Map<String, Value>, path: &str) -> Result<Vec<Node>, DeserializeError> {
    let has_connective = obj.keys().any(|key| Connective::from_wire(key).is_some());
    if has_connective {
        if obj.len() != 1 {
            return Err(DeserializeError::new(
                "a boolean connective cannot be mixed with other keys",
                path,
            ));
        }
        let (key, value) = obj.iter().next().expect("checked non-empty");
        return Ok(vec![Node::Group(parse_connective(key, value, path)?)]);
    }

    let mut nodes = Vec::new();
    for (key, value) in obj {
        let node_path = format!("{}.{}", path, key);
        if key == "_exists" {
            return Err(DeserializeError::new(
                "'_exists' expressions are not supported",
                node_path,
            ));
        }
        if Comparison::from_wire(key).is_some() {
            return Err(DeserializeError::new(
                format!("comparison operator '{}' found where a column was expected", key),
                node_path,
            ));
        }
        if key.starts_with('_') {
            return Err(DeserializeError::new(
                format!("unrecognized operator '{}'", key),
                node_path,
            ));
        }
        let child = value.as_object().ok_or_else(|| {
            DeserializeError::new("expected an object under a column key", &node_path)
        })?;
        nodes.extend(parse_column_object(key, child, &node_path)?);
    }
    Ok(nodes)
}

/// Walks the object under a column key. Comparison keys terminate the
/// walk as leaves, plain keys extend the relationship path, and a nested
/// connective is parsed as a standalone group whose leaves get prefixed
/// with the path walked so far.
fn parse_column_object(
    prefix: &str,
    obj: &Map<String, Value>,
    path: &str,
) -> Result<Vec<Node>, DeserializeError> {
    if obj.is_empty() {
        return Err(DeserializeError::new("expected a comparison, found an empty object", path));
    }
    let mut nodes = Vec::new();
    for (key, value) in obj {
        let node_path = format!("{}.{}", path, key);
        if let Some(operator) = Comparison::from_wire(key) {
            nodes.push(Node::Rule(Rule {
                column: prefix.to_string(),
                operator,
                value: normalize_value(operator, value.clone()),
            }));
        } else if Connective::from_wire(key).is_some() {
            let mut group = parse_connective(key, value, path)?;
            group.prefix_columns(prefix);
            nodes.push(Node::Group(group));
        } else if key == "_exists" {
            return Err(DeserializeError::new(
                "'_exists' expressions are not supported",
                node_path,
            ));
        } else if key.starts_with('_') {
            return Err(DeserializeError::new(
                format!("unrecognized operator '{}'", key),
                node_path,
            ));
        } else {
            let child = value.as_object().ok_or_else(|| {
                DeserializeError::new("expected an object under a column key", &node_path)
            })?;
            let joined = format!("{}.{}", prefix, key);
            nodes.extend(parse_column_object(&joined, child, &node_path)?);
        }
    }
    Ok(nodes)
}

fn parse_connective(key: &str, value: &Value, path: &str) -> Result<RuleGroup, DeserializeError> {
    let node_path = format!("{}.{}", path, key);
    match Connective::from_wire(key).expect("caller checked the key") {
        connective @ (Connective::And | Connective::Or) => {
            let items = value.as_array().ok_or_else(|| {
                DeserializeError::new(format!("expected an array under '{}'", key), &node_path)
            })?;
            let mut group = RuleGroup::new(connective);
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", node_path, index);
                let obj = item.as_object().ok_or_else(|| {
                    DeserializeError::new("expected an object", &item_path)
                })?;
                let nodes = parse_object(obj, &item_path)?;
                append_children(&mut group, nodes);
            }
            Ok(group)
        }
        Connective::Not => {
            let obj = value.as_object().ok_or_else(|| {
                DeserializeError::new("expected an object under '_not'", &node_path)
            })?;
            let mut group = RuleGroup::new(Connective::Not);
            if obj.is_empty() {
                return Ok(group);
            }
            let nodes = parse_object(obj, &node_path)?;
            if nodes.len() == 1 {
                append_children(&mut group, nodes);
            } else {
                // An implicit conjunction under a negation keeps its own
                // group so the negation has exactly one child.
                group.groups.push(assemble(nodes));
            }
            Ok(group)
        }
    }
}

/// Splices parsed nodes into a group. A multi-node batch inside an `_or`
/// is an implicit conjunction and keeps its own `_and` group; everywhere
/// else the nodes inline.
fn append_children(group: &mut RuleGroup, nodes: Vec<Node>) {
    if group.connective == Connective::Or && nodes.len() > 1 {
        group.groups.push(assemble(nodes));
        return;
    }
    for node in nodes {
        match node {
            Node::Rule(rule) => group.rules.push(rule),
            Node::Group(sub) => group.groups.push(sub),
        }
    }
}
