// Decoding step descriptors produced by the external parser
use gremlin_translator::gremlin_ast::{By, Pop, Predicate, RepeatStep, Step, Traversal};

fn parse(json: &str) -> Traversal {
    serde_json::from_str(json).expect("valid traversal json")
}

#[test]
fn test_simple_chain_matches_builder() {
    let parsed = parse(r#"{"steps": [{"V": []}, {"out": ["knows"]}, {"values": ["name"]}]}"#);
    assert_eq!(
        parsed,
        Traversal::new().v().out(&["knows"]).values(&["name"])
    );
}

#[test]
fn test_unit_steps_are_plain_strings() {
    let parsed = parse(r#"{"steps": [{"V": []}, "count"]}"#);
    assert_eq!(parsed.steps[1], Step::Count);

    let parsed = parse(r#"{"steps": [{"E": []}, "outV", "dedup"]}"#);
    assert_eq!(parsed.steps[1], Step::OutV);
    assert_eq!(parsed.steps[2], Step::Dedup);
}

#[test]
fn test_select_defaults_to_last() {
    let parsed = parse(r#"{"steps": [{"select": {"labels": ["a"]}}]}"#);
    assert_eq!(
        parsed.steps[0],
        Step::Select {
            pop: Pop::Last,
            labels: vec!["a".to_string()],
            by: vec![],
        }
    );

    let parsed = parse(
        r#"{"steps": [{"select": {"pop": "first", "labels": ["a", "b"], "by": [{"key": "name"}]}}]}"#,
    );
    assert_eq!(
        parsed.steps[0],
        Step::Select {
            pop: Pop::First,
            labels: vec!["a".to_string(), "b".to_string()],
            by: vec![By::Key("name".to_string())],
        }
    );
}

#[test]
fn test_has_with_predicate() {
    let parsed = parse(
        r#"{"steps": [{"V": []}, {"has": {"key": "age", "predicate": {"op": "gt", "values": [29]}}}]}"#,
    );
    assert_eq!(
        parsed,
        Traversal::new().v().has_predicate("age", Predicate::gt(29))
    );
}

#[test]
fn test_repeat_with_modulators() {
    let parsed = parse(
        r#"{"steps": [{"V": []}, {"repeat": {
            "body": {"steps": [{"in": []}, {"as": ["a"]}]},
            "until": {"steps": [{"has": {"key": "name", "predicate": {"op": "eq", "values": ["marko"]}}}]},
            "times": 4
        }}]}"#,
    );
    let expected = Traversal::new().v().repeat(
        RepeatStep::new(Traversal::new().in_(&[]).as_("a"))
            .until(Traversal::new().has("name", "marko"))
            .times(4),
    );
    assert_eq!(parsed, expected);
}

#[test]
fn test_unknown_step_is_rejected() {
    let result: Result<Traversal, _> = serde_json::from_str(r#"{"steps": [{"shortestPath": []}]}"#);
    assert!(result.is_err());
}
