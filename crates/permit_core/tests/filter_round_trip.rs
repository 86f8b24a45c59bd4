// Round-trip fixtures for the boolean-expression converter: every
// well-formed tree must survive to_external -> from_external unchanged,
// and representative backend documents must parse to the expected shape.

use permit_core::{from_external, to_external, Comparison, Connective, Rule, RuleGroup};
use serde_json::{json, Value};

fn rule(column: &str, operator: Comparison, value: Value) -> Rule {
    Rule::new(column, operator, value)
}

fn group(connective: Connective, rules: Vec<Rule>, groups: Vec<RuleGroup>) -> RuleGroup {
    RuleGroup {
        connective,
        rules,
        groups,
    }
}

#[test]
fn fixture_documents_round_trip_through_the_model() {
    let documents = [
        json!({}),
        json!({ "title": { "_eq": "test" } }),
        json!({ "title": { "_is_null": "true" } }),
        json!({ "author": { "name": { "_eq": "John Doe" } } }),
        json!({ "books": { "author": { "id": { "_eq": "X-Hasura-User-Id" } } } }),
        json!({ "_or": [
            { "title": { "_eq": "test" } },
            { "title": { "_eq": "test2" } },
        ]}),
        json!({ "_and": [
            { "status": { "_in": ["draft", "live"] } },
            { "_or": [
                { "age": { "_gt": 32 } },
                { "age": { "_lte": 48 } },
            ]},
        ]}),
        json!({ "_not": { "title": { "_eq": "test" } } }),
        json!({ "_not": { "_or": [
            { "title": { "_eq": "test" } },
            { "age": { "_gt": 32 } },
        ]}}),
        json!({ "metadata": { "_contains": { "foo": "bar" } } }),
        json!({ "metadata": { "_has_keys_all": ["a", "b"] } }),
    ];

    for document in documents {
        let parsed = from_external(&document).expect("fixture parses");
        let reparsed = from_external(&to_external(&parsed)).expect("serialized form parses");
        assert_eq!(reparsed, parsed, "model round-trip failed for {}", document);
    }
}

#[test]
fn model_trees_round_trip_through_the_wire() {
    let trees = [
        RuleGroup::empty(),
        group(Connective::Or, vec![], vec![]),
        group(Connective::Not, vec![], vec![]),
        group(
            Connective::And,
            vec![rule("title", Comparison::Eq, json!(""))],
            vec![],
        ),
        group(
            Connective::Or,
            vec![
                rule("title", Comparison::Ilike, json!("%draft%")),
                rule("author.name", Comparison::Neq, json!("")),
            ],
            vec![group(
                Connective::And,
                vec![rule("age", Comparison::Gte, json!(18))],
                vec![group(Connective::Not, vec![], vec![])],
            )],
        ),
        group(
            Connective::Not,
            vec![],
            vec![group(
                Connective::And,
                vec![
                    rule("a", Comparison::Eq, json!("1")),
                    rule("b", Comparison::Eq, json!("2")),
                ],
                vec![],
            )],
        ),
        group(
            Connective::And,
            vec![rule(
                "settings.notifications.email",
                Comparison::Eq,
                json!("enabled"),
            )],
            vec![group(
                Connective::Or,
                vec![rule("deleted_at", Comparison::IsNull, json!("true"))],
                vec![],
            )],
        ),
    ];

    for tree in trees {
        let wire = to_external(&tree);
        let back = from_external(&wire).expect("wire form parses");
        assert_eq!(back, tree, "wire round-trip failed for {:?}", tree);
    }
}

#[test]
fn the_sentinel_and_its_absence_stay_distinct() {
    // {} is "always true"; it still parses to a group (the sentinel), so
    // "no filter configured" has to be modeled as absence by the caller.
    let sentinel = from_external(&json!({})).unwrap();
    assert!(sentinel.is_empty());
    assert_eq!(to_external(&sentinel), json!({}));
}

#[test]
fn unsupported_nodes_fail_with_a_path() {
    let err = from_external(&json!({
        "_and": [
            { "a": { "_eq": "1" } },
            { "b": { "_within": "x" } },
        ]
    }))
    .unwrap_err();
    assert_eq!(err.path, "$._and[1].b._within");

    let err = from_external(&json!({ "_exists": { "_table": {} } })).unwrap_err();
    assert!(err.message.contains("_exists"));
}
