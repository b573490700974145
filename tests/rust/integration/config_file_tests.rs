// Compiler configuration loaded from YAML files
use std::io::Write;

use gremlin_translator::{
    compile_traversal,
    config::{CliConfig, CompilerConfig, ConfigOverlay},
    gremlin_ast::{RepeatStep, Traversal},
    render_plan::{FunctionParam, Literal, ScalarExpr},
};
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_disabled_match_paths_from_file() -> anyhow::Result<()> {
    let file = write_config("enable_match_paths: false\n")?;
    let config = CompilerConfig::from_yaml_file(file.path())?;
    assert!(!config.enable_match_paths);
    assert_eq!(config.max_repeat_depth, 100);

    let block = compile_traversal(&Traversal::new().v().out(&["knows"]), &config)?;
    assert!(block.match_clause.is_none());
    assert!(block.find_table_function("VertexToForwardEdge").is_some());
    assert!(block.find_table_function("EdgeToSinkVertex").is_some());
    Ok(())
}

#[test]
fn test_default_column_names_composite_output() -> anyhow::Result<()> {
    let file = write_config("default_column: out_value\n")?;
    let config = CompilerConfig::from_yaml_file(file.path())?;

    let block = compile_traversal(
        &Traversal::new()
            .v()
            .union(vec![Traversal::new().out(&[]), Traversal::new().in_(&[])]),
        &config,
    )?;
    let union = block.find_table_function("Union").expect("union construct");
    for branch in union.queries().next().expect("branches").blocks() {
        assert_eq!(branch.column_names()[0], "out_value");
    }
    assert_eq!(
        block.select[0].expr,
        ScalarExpr::column(union.alias.clone(), "out_value")
    );
    Ok(())
}

#[test]
fn test_repeat_depth_from_file_caps_unbounded_loops() -> anyhow::Result<()> {
    let file = write_config("max_repeat_depth: 12\n")?;
    let config = CompilerConfig::from_yaml_file(file.path())?;

    let block = compile_traversal(
        &Traversal::new()
            .v()
            .repeat(RepeatStep::new(Traversal::new().out(&[])).emit()),
        &config,
    )?;
    let repeat = block.find_table_function("Repeat").expect("loop construct");
    assert_eq!(
        repeat.params[3],
        FunctionParam::Scalar(ScalarExpr::Literal(Literal::Integer(12)))
    );
    Ok(())
}

#[test]
fn test_cli_overrides_take_precedence_over_file() -> anyhow::Result<()> {
    let file = write_config("max_repeat_depth: 12\nenable_match_paths: true\n")?;
    let mut config = CompilerConfig::default();
    config.merge(ConfigOverlay::from_yaml_file(file.path())?)?;
    let config = config.with_cli_overrides(CliConfig {
        max_repeat_depth: Some(3),
        no_match_paths: true,
    })?;

    assert_eq!(config.max_repeat_depth, 3);
    assert!(!config.enable_match_paths);
    Ok(())
}

#[test]
fn test_invalid_values_are_rejected() -> anyhow::Result<()> {
    let file = write_config("max_repeat_depth: 0\n")?;
    assert!(CompilerConfig::from_yaml_file(file.path()).is_err());

    let file = write_config("default_column: \"bad column\"\n")?;
    assert!(CompilerConfig::from_yaml_file(file.path()).is_err());

    let file = write_config("enable_match_paths: [not, a, bool]\n")?;
    assert!(CompilerConfig::from_yaml_file(file.path()).is_err());
    Ok(())
}

#[test]
fn test_partial_file_keeps_environment_settings() -> anyhow::Result<()> {
    // no other test in this binary reads this variable
    std::env::set_var("GREMLIN_TRANSLATOR_MAX_REPEAT_DEPTH", "50");
    let mut config = CompilerConfig::from_env()?;
    std::env::remove_var("GREMLIN_TRANSLATOR_MAX_REPEAT_DEPTH");

    let file = write_config("enable_match_paths: false\n")?;
    config.merge(ConfigOverlay::from_yaml_file(file.path())?)?;
    assert_eq!(config.max_repeat_depth, 50);
    assert!(!config.enable_match_paths);

    let block = compile_traversal(
        &Traversal::new()
            .v()
            .repeat(RepeatStep::new(Traversal::new().out(&[])).emit()),
        &config,
    )?;
    let repeat = block.find_table_function("Repeat").expect("loop construct");
    assert_eq!(
        repeat.params[3],
        FunctionParam::Scalar(ScalarExpr::Literal(Literal::Integer(50)))
    );
    Ok(())
}
