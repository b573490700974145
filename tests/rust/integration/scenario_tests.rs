// End-to-end compilation of representative traversals
use gremlin_translator::{
    compile_traversal,
    gremlin_ast::{By, Pop, RepeatStep, Traversal},
    query_planner::types::{StepName, VariableType},
    render_plan::{BooleanExpr, ComparisonOp, FromItem, FunctionParam, Literal, QueryExpr, ScalarExpr},
    CompilerConfig, QueryBlock, TranslationError,
};

fn compile(t: Traversal) -> Result<QueryBlock, TranslationError> {
    compile_traversal(&t, &CompilerConfig::default())
}

#[test]
fn test_simple_chain() {
    let block = compile(Traversal::new().v().out(&["knows"]).values(&["name"])).unwrap();

    let named: Vec<(&str, &str)> = block
        .named_sources()
        .map(|n| (n.name.as_str(), n.alias.as_str()))
        .collect();
    assert_eq!(named, vec![("Node", "N_0"), ("Edge", "E_1"), ("Node", "N_2")]);

    let values = block.find_table_function("Values").unwrap();
    assert_eq!(values.alias, "R_3");
    assert_eq!(
        values.params,
        vec![FunctionParam::Scalar(ScalarExpr::column("N_2", "name"))]
    );

    let path = &block.match_clause.as_ref().unwrap().paths[0];
    assert_eq!(
        (path.source.as_deref(), path.edge.as_str(), path.sink.as_deref()),
        (Some("N_0"), "E_1", Some("N_2"))
    );
    assert_eq!(
        block.where_clause,
        Some(BooleanExpr::compare(
            ComparisonOp::Equal,
            ScalarExpr::column("E_1", "label"),
            ScalarExpr::Literal(Literal::String("knows".to_string())),
        ))
    );
}

#[test]
fn test_select_by_property_columns_do_not_collide() {
    let block = compile(
        Traversal::new()
            .v()
            .as_("a")
            .out(&[])
            .as_("b")
            .select_by(&["a", "b"], vec![By::Key("name".to_string())]),
    )
    .unwrap();

    let columns = block.column_names();
    assert!(columns.contains(&"a_0_name"));
    assert!(columns.contains(&"b_1_name"));
    assert_ne!(
        block.select_item("a_0_name").unwrap().expr,
        block.select_item("b_1_name").unwrap().expr
    );
}

#[test]
fn test_repeat_with_loop_referenced_select() {
    let block = compile(
        Traversal::new()
            .v()
            .repeat(
                RepeatStep::new(Traversal::new().in_(&[]).as_("a"))
                    .until(Traversal::new().has_label(&["person"]))
                    .emit(),
            )
            .select(&["a"]),
    )
    .unwrap();

    let repeat = block.find_table_function("Repeat").unwrap();
    assert_eq!(repeat.params.len(), 6);
    let FunctionParam::Query(QueryExpr::UnionAll(seed, step)) = &repeat.params[0] else {
        panic!("Expected the recursive UNION ALL, got {:?}", repeat.params[0]);
    };
    let seed = seed.blocks()[0];
    let step = step.blocks()[0];
    assert_eq!(seed.column_names(), step.column_names());

    let ghost_column = match &block.select[0].expr {
        ScalarExpr::Column(c) => c.column.clone(),
        other => panic!("Expected a loop column, got {:?}", other),
    };
    assert!(seed.select_item(&ghost_column).is_some());
    assert!(step.select_item(&ghost_column).is_some());

    // until reads the loop relation, not the body
    let FunctionParam::Predicate(until) = &repeat.params[1] else {
        panic!("Expected the until predicate");
    };
    assert_eq!(
        until,
        &BooleanExpr::compare(
            ComparisonOp::Equal,
            ScalarExpr::column(repeat.alias.clone(), "label"),
            ScalarExpr::Literal(Literal::String("person".to_string())),
        )
    );
}

#[test]
fn test_coalesce_typing_controls_following_steps() {
    let same = Traversal::new()
        .v()
        .coalesce(vec![Traversal::new().out(&[]), Traversal::new().in_(&[])])
        .out(&[]);
    assert!(compile(same).is_ok());

    let mixed = Traversal::new()
        .v()
        .coalesce(vec![Traversal::new().out(&[]), Traversal::new().constant(1)])
        .out(&[]);
    assert_eq!(
        compile(mixed).unwrap_err(),
        TranslationError::InvalidStep {
            step: StepName::Out,
            var_type: VariableType::Mixed,
        }
    );
}

#[test]
fn test_label_ordering_on_a_straight_line() {
    let straight = Traversal::new().v().as_("x").out(&[]).as_("x").out(&[]).as_("x");
    let first = compile(straight.clone().select_pop(Pop::First, "x")).unwrap();
    let last = compile(straight.select_pop(Pop::Last, "x")).unwrap();
    assert_eq!(first.select[0].expr, ScalarExpr::column("N_0", "id"));
    assert_eq!(last.select[0].expr, ScalarExpr::column("N_4", "id"));

    let all = compile(
        Traversal::new()
            .v()
            .as_("x")
            .out(&[])
            .as_("x")
            .select_pop(Pop::All, "x"),
    )
    .unwrap();
    match &all.select[0].expr {
        ScalarExpr::FunctionCall(call) => {
            assert_eq!(call.name, "List");
            assert_eq!(
                call.args,
                vec![ScalarExpr::column("N_0", "id"), ScalarExpr::column("N_2", "id")]
            );
        }
        other => panic!("Expected a list, got {:?}", other),
    }
}

#[test]
fn test_properties_reach_every_union_branch() {
    let block = compile(
        Traversal::new()
            .v()
            .union(vec![
                Traversal::new().out(&["knows"]),
                Traversal::new().out(&["created"]),
                Traversal::new(),
            ])
            .has("age", 30),
    )
    .unwrap();

    let union = block.find_table_function("Union").unwrap();
    let FunctionParam::Query(query) = &union.params[0] else {
        panic!("Expected branches");
    };
    for branch in query.blocks() {
        assert_eq!(branch.column_names(), vec!["_default", "age"]);
        assert!(!branch.select[1].expr.is_null_literal());
    }
    assert!(block
        .from
        .iter()
        .all(|f| !matches!(f, FromItem::TableFunction(t) if t.name == "Filter")));
}

#[test]
fn test_errors_are_reported_not_panicked() {
    assert!(matches!(
        compile(Traversal::new().v().select(&["missing"])),
        Err(TranslationError::UndefinedTag { .. })
    ));
    assert!(matches!(
        compile(Traversal::new().values(&["name"])),
        Err(TranslationError::MissingPivot { .. })
    ));
    assert!(matches!(
        compile(Traversal::new().e().out(&[])),
        Err(TranslationError::InvalidStep { .. })
    ));
}
