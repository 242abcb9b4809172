//! Multiplicative composition of typed dependencies.
//!
//! Dependencies are evaluated strictly in attach order:
//!
//! - `Bool(true)` leaves the product unchanged, `Bool(false)` stops and yields `0`;
//! - integers and reals multiply into the running total;
//! - once the total or a factor is [`IMPASSABLE`] the total stays impassable,
//!   but evaluation carries on so a later `false` can still gate the edge;
//! - an exact `0` total is absorbing and stops evaluation.
//!
//! No dependencies yields `1`.

use crate::error::{Error, Result};

use super::{EvalContext, FeatureGraph, FeatureNode, FeatureValue, ValueKind, IMPASSABLE};

pub(crate) fn aggregate(
    graph: &FeatureGraph,
    node: &FeatureNode,
    ctx: &EvalContext<'_>,
) -> Result<f64> {
    let mut total = 1.0;
    for dependency in &node.dependencies {
        let Some(declared) = dependency.kind else {
            return Err(Error::MissingDependencyKind {
                feature: node.name.clone(),
                dependency: graph.node(dependency.feature)?.name.clone(),
            });
        };

        match (declared, graph.evaluate(dependency.feature, ctx)?) {
            (ValueKind::Bool, FeatureValue::Bool(true)) => {}
            (ValueKind::Bool, FeatureValue::Bool(false)) => return Ok(0.0),
            (ValueKind::Int, FeatureValue::Int(value)) => total = combine(total, value as f64),
            (ValueKind::Real, FeatureValue::Real(value)) => total = combine(total, value),
            (expected, actual) => {
                return Err(Error::FeatureType {
                    feature: graph.node(dependency.feature)?.name.clone(),
                    expected,
                    actual: actual.kind(),
                })
            }
        }

        if total == 0.0 {
            break;
        }
    }

    Ok(total)
}

fn combine(total: f64, value: f64) -> f64 {
    if total == IMPASSABLE || value == IMPASSABLE {
        IMPASSABLE
    } else {
        total * value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{EdgeGeometry, NodeKind};
    use crate::mesh::Point3;

    fn ctx() -> EvalContext<'static> {
        EvalContext::Edge(EdgeGeometry {
            face: None,
            source: Point3::default(),
            target: Point3::new(1.0, 0.0, 0.0),
        })
    }

    fn product(values: &[FeatureValue]) -> f64 {
        let mut graph = FeatureGraph::new();
        let root = graph.add("product", NodeKind::Multiplier).unwrap();
        for (index, value) in values.iter().enumerate() {
            let id = graph
                .add(format!("input-{index}"), NodeKind::Constant(*value))
                .unwrap();
            graph.add_typed_dependency(root, id, value.kind()).unwrap();
        }
        graph.evaluate_real(root, &ctx()).unwrap()
    }

    #[test]
    fn empty_product_is_one() {
        assert_eq!(product(&[]), 1.0);
    }

    #[test]
    fn mixes_integers_and_reals() {
        let total = product(&[
            FeatureValue::Int(3),
            FeatureValue::Bool(true),
            FeatureValue::Real(0.5),
        ]);
        assert_eq!(total, 1.5);
    }

    #[test]
    fn false_gate_yields_zero_even_after_impassable() {
        let total = product(&[FeatureValue::Real(IMPASSABLE), FeatureValue::Bool(false)]);
        assert_eq!(total, 0.0);
    }

    #[test]
    fn zero_total_is_absorbing() {
        assert_eq!(
            product(&[FeatureValue::Real(0.0), FeatureValue::Real(IMPASSABLE)]),
            0.0
        );
        assert_eq!(
            product(&[FeatureValue::Int(0), FeatureValue::Bool(false)]),
            0.0
        );
    }

    #[test]
    fn impassable_is_never_reduced() {
        assert_eq!(
            product(&[
                FeatureValue::Real(2.0),
                FeatureValue::Real(IMPASSABLE),
                FeatureValue::Real(0.0),
                FeatureValue::Int(4),
            ]),
            IMPASSABLE
        );
    }

    #[test]
    fn untyped_attach_is_rejected() {
        let mut graph = FeatureGraph::new();
        let root = graph.add("product", NodeKind::Multiplier).unwrap();
        let input = graph.add("distance", NodeKind::Distance).unwrap();
        let err = graph.add_dependency(root, input).expect_err("kind is required");
        assert!(matches!(err, Error::UntypedDependency { .. }));
        assert!(graph.node(root).unwrap().dependencies().is_empty());
    }

    #[test]
    fn declared_kind_must_match_output() {
        let mut graph = FeatureGraph::new();
        let root = graph.add("product", NodeKind::Multiplier).unwrap();
        let input = graph.add("distance", NodeKind::Distance).unwrap();
        let err = graph
            .add_typed_dependency(root, input, ValueKind::Bool)
            .expect_err("distance is real");
        assert!(matches!(err, Error::DependencyKindMismatch { .. }));
    }
}
