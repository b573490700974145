// Capability registry and type unification
use gremlin_translator::query_planner::types::{supports, StepName, VariableType};
use test_case::test_case;

#[test_case(VariableType::Vertex, StepName::Out, true; "vertex expands")]
#[test_case(VariableType::Vertex, StepName::InV, false; "vertex has no edge endpoints")]
#[test_case(VariableType::Edge, StepName::OutV, true; "edge reaches its source")]
#[test_case(VariableType::Edge, StepName::Both, false; "edge does not expand")]
#[test_case(VariableType::VertexAndEdge, StepName::Values, true; "mixed elements keep properties")]
#[test_case(VariableType::VertexAndEdge, StepName::Out, false; "mixed elements lose adjacency")]
#[test_case(VariableType::Scalar, StepName::Count, true; "scalar aggregates")]
#[test_case(VariableType::Scalar, StepName::Values, false; "scalar has no properties")]
#[test_case(VariableType::Mixed, StepName::Values, true; "mixed keeps type-erased steps")]
#[test_case(VariableType::Mixed, StepName::Out, false; "mixed rejects adjacency")]
#[test_case(VariableType::VertexProperty, StepName::Key, true; "vertex property key")]
#[test_case(VariableType::Property, StepName::Values, false; "edge property has no meta properties")]
#[test_case(VariableType::MapEntry, StepName::Value, true; "map entry value")]
#[test_case(VariableType::Null, StepName::Has, false; "dropped value cannot be filtered by key")]
fn test_supports(var_type: VariableType, step: StepName, expected: bool) {
    assert_eq!(supports(var_type, step), expected);
}

#[test_case(&[VariableType::Vertex, VariableType::Vertex], VariableType::Vertex; "identical")]
#[test_case(&[VariableType::Vertex, VariableType::Edge], VariableType::VertexAndEdge; "elements")]
#[test_case(&[VariableType::Vertex, VariableType::Scalar], VariableType::Mixed; "element and scalar")]
#[test_case(&[VariableType::Scalar, VariableType::Null], VariableType::Scalar; "null branch ignored")]
#[test_case(&[VariableType::Null], VariableType::Null; "only null")]
fn test_unify(types: &[VariableType], expected: VariableType) {
    assert_eq!(VariableType::unify(types), expected);
}

#[test]
fn test_every_type_accepts_universal_steps() {
    let all = [
        VariableType::Vertex,
        VariableType::Edge,
        VariableType::VertexAndEdge,
        VariableType::Scalar,
        VariableType::Property,
        VariableType::VertexProperty,
        VariableType::Map,
        VariableType::MapEntry,
        VariableType::List,
        VariableType::Path,
        VariableType::Tree,
        VariableType::Subgraph,
        VariableType::Mixed,
        VariableType::Unknown,
        VariableType::Null,
    ];
    for var_type in all {
        for step in [StepName::As, StepName::Select, StepName::Count, StepName::Union] {
            assert!(supports(var_type, step), "{} should accept {}", var_type, step);
        }
    }
}
