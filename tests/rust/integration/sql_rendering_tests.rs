// Text rendering of compiled blocks
use gremlin_translator::{
    compile_traversal, gremlin_ast::Traversal, CompilerConfig, QueryBlock, ToSql,
};

fn render(t: Traversal, config: &CompilerConfig) -> String {
    let block: QueryBlock = compile_traversal(&t, config).unwrap();
    block.to_sql()
}

#[test]
fn test_simple_chain_sql() {
    let sql = render(
        Traversal::new().v().out(&["knows"]).values(&["name"]),
        &CompilerConfig::default(),
    );
    assert_eq!(
        sql,
        "SELECT R_3.value AS _default\n\
         FROM Node AS N_0, Edge AS E_1, Node AS N_2\n  \
         CROSS APPLY Values(N_2.name) AS R_3\n\
         MATCH N_0-(E_1)->N_2\n\
         WHERE E_1.label = 'knows'"
    );
}

#[test]
fn test_string_literals_are_escaped() {
    let sql = render(
        Traversal::new().v().has("name", "o'brien"),
        &CompilerConfig::default(),
    );
    assert!(sql.contains("WHERE N_0.name = 'o''brien'"), "{}", sql);
}

#[test]
fn test_expansions_without_match_paths() {
    let config = CompilerConfig {
        enable_match_paths: false,
        ..Default::default()
    };
    let sql = render(Traversal::new().v().out(&[]), &config);
    assert!(!sql.contains("\nMATCH"), "{}", sql);
    assert!(sql.contains("CROSS APPLY VertexToForwardEdge(N_0.id) AS E_1"), "{}", sql);
    assert!(sql.contains("CROSS APPLY EdgeToSinkVertex("), "{}", sql);
}

#[test]
fn test_loop_renders_recursive_union() {
    let sql = render(
        Traversal::new().v().repeat(
            gremlin_translator::gremlin_ast::RepeatStep::new(Traversal::new().out(&[])).times(3),
        ),
        &CompilerConfig::default(),
    );
    assert!(sql.contains("CROSS APPLY Repeat("), "{}", sql);
    assert!(sql.contains("UNION ALL"), "{}", sql);
    assert!(sql.ends_with(") AS R_1"), "{}", sql);
}
