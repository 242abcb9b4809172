//! Feature graph used to price mesh edges.
//!
//! A feature is a named node that produces an integer, real or boolean value
//! for the edge currently being priced. Nodes live in an arena
//! ([`FeatureGraph`]) and refer to their dependencies by [`FeatureId`], so a
//! node may be shared by several parents. Attaching a dependency that would
//! close a cycle is rejected, which keeps the graph a DAG.
//!
//! - [`multiplier`] - ordered, short-circuiting product of typed dependencies
//! - [`curve`] - gradient to walking-speed curves
//! - [`raster`] - leaf nodes backed by an external tiled raster
//!
//! Evaluation is a pure function of the [`EvalContext`]: the same edge may be
//! priced many times during a search and always yields the same value.

pub mod curve;
pub mod multiplier;
pub mod raster;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mesh::{FaceId, Point3};
use crate::state::RouteState;

pub use curve::{solve_polynomial, GradientCurves};
pub use raster::{MemoryRaster, RasterLayer, RasterSource, RasterSources, TileKey, TileRequest};

/// Value meaning "this edge cannot be traversed".
pub const IMPASSABLE: f64 = f64::INFINITY;

/// Result type tag of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "double")]
    Real,
    #[serde(alias = "boolean")]
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ValueKind::Int => "integer",
            ValueKind::Real => "real",
            ValueKind::Bool => "boolean",
        };
        f.write_str(value)
    }
}

/// Value produced by evaluating a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Real(f64),
    Bool(bool),
}

impl FeatureValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FeatureValue::Int(_) => ValueKind::Int,
            FeatureValue::Real(_) => ValueKind::Real,
            FeatureValue::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            FeatureValue::Real(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FeatureValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

/// Stable handle of a node inside a [`FeatureGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(usize);

impl FeatureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Local geometry of the edge being priced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeGeometry {
    /// Face crossed by the edge, if known.
    pub face: Option<FaceId>,
    pub source: Point3,
    pub target: Point3,
}

/// Input a feature is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum EvalContext<'a> {
    /// Only the local geometry of one edge.
    Edge(EdgeGeometry),
    /// The full route state; the edge is read from its current cursor.
    State(&'a RouteState),
}

impl EvalContext<'_> {
    /// Edge being priced, whichever shape the context has.
    pub fn edge(&self) -> Option<EdgeGeometry> {
        match self {
            EvalContext::Edge(edge) => Some(*edge),
            EvalContext::State(state) => state.current_edge(),
        }
    }
}

/// Computation performed by a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Fixed value.
    Constant(FeatureValue),
    /// 3D length of the edge.
    Distance,
    /// Signed rise over horizontal run of the edge.
    Gradient,
    /// `true` while the absolute value of its single real dependency is at most `max`.
    SlopeLimit { max: f64 },
    /// `1 / x` of its single real dependency; `1 / 0` is impassable.
    Reciprocal,
    /// Product of typed dependencies, see [`multiplier`].
    Multiplier,
    /// Speed factor for the gradient supplied by its single dependency.
    GradientSpeed(GradientCurves),
    /// Value sampled from an external raster at the edge target.
    Raster(RasterLayer),
    /// `false` when the priced edge crosses a face whose warning is at least
    /// `min_severity`. Needs the route state.
    HazardFree { min_severity: u16 },
}

impl NodeKind {
    /// Type tag of the values this node produces.
    pub fn output_kind(&self) -> ValueKind {
        match self {
            NodeKind::Constant(value) => value.kind(),
            NodeKind::SlopeLimit { .. } | NodeKind::HazardFree { .. } => ValueKind::Bool,
            NodeKind::Distance
            | NodeKind::Gradient
            | NodeKind::Reciprocal
            | NodeKind::Multiplier
            | NodeKind::GradientSpeed(_)
            | NodeKind::Raster(_) => ValueKind::Real,
        }
    }

    fn expected_arity(&self) -> Option<usize> {
        match self {
            NodeKind::Multiplier => None,
            NodeKind::SlopeLimit { .. } | NodeKind::Reciprocal | NodeKind::GradientSpeed(_) => {
                Some(1)
            }
            NodeKind::Constant(_)
            | NodeKind::Distance
            | NodeKind::Gradient
            | NodeKind::Raster(_)
            | NodeKind::HazardFree { .. } => Some(0),
        }
    }
}

/// Edge from a node to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub feature: FeatureId,
    /// Kind declared when the dependency was attached, if any.
    pub kind: Option<ValueKind>,
}

/// A named node of the feature graph.
#[derive(Debug, Clone)]
pub struct FeatureNode {
    name: String,
    kind: NodeKind,
    dependencies: Vec<Dependency>,
}

impl FeatureNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

/// Arena of feature nodes. Built once, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct FeatureGraph {
    nodes: Vec<FeatureNode>,
    by_name: HashMap<String, FeatureId>,
}

impl FeatureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under a unique id.
    pub fn add(&mut self, name: impl Into<String>, kind: NodeKind) -> Result<FeatureId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateFeature { name });
        }
        let id = FeatureId(self.nodes.len());
        self.by_name.insert(name.clone(), id);
        self.nodes.push(FeatureNode {
            name,
            kind,
            dependencies: Vec::new(),
        });
        Ok(id)
    }

    /// Append an untyped dependency. Multipliers reject this: their inputs
    /// must go through [`FeatureGraph::add_typed_dependency`].
    pub fn add_dependency(&mut self, parent: FeatureId, child: FeatureId) -> Result<()> {
        let node = self.node(parent)?;
        if matches!(node.kind, NodeKind::Multiplier) {
            return Err(Error::UntypedDependency {
                feature: node.name.clone(),
            });
        }
        self.attach(parent, child, None)
    }

    /// Append a dependency together with the kind it is expected to produce.
    pub fn add_typed_dependency(
        &mut self,
        parent: FeatureId,
        child: FeatureId,
        kind: ValueKind,
    ) -> Result<()> {
        let actual = self.node(child)?.kind.output_kind();
        if actual != kind {
            return Err(Error::DependencyKindMismatch {
                feature: self.node(parent)?.name.clone(),
                dependency: self.node(child)?.name.clone(),
                declared: kind,
                actual,
            });
        }
        self.attach(parent, child, Some(kind))
    }

    fn attach(
        &mut self,
        parent: FeatureId,
        child: FeatureId,
        kind: Option<ValueKind>,
    ) -> Result<()> {
        self.node(child)?;
        self.node(parent)?;
        if parent == child || self.reaches(child, parent) {
            return Err(Error::DependencyCycle {
                feature: self.nodes[parent.0].name.clone(),
                dependency: self.nodes[child.0].name.clone(),
            });
        }
        self.nodes[parent.0].dependencies.push(Dependency {
            feature: child,
            kind,
        });
        Ok(())
    }

    /// Whether `to` is reachable from `from` by following dependencies.
    fn reaches(&self, from: FeatureId, to: FeatureId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if std::mem::replace(&mut visited[current.0], true) {
                continue;
            }
            stack.extend(self.nodes[current.0].dependencies.iter().map(|d| d.feature));
        }
        false
    }

    /// Check that every node has as many dependencies as its kind needs.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            if let Some(expected) = node.kind.expected_arity() {
                if node.dependencies.len() != expected {
                    return Err(Error::DependencyArity {
                        feature: node.name.clone(),
                        expected,
                        found: node.dependencies.len(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn id(&self, name: &str) -> Option<FeatureId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: FeatureId) -> Result<&FeatureNode> {
        self.nodes.get(id.0).ok_or_else(|| Error::UnknownFeature {
            name: format!("#{}", id.0),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &FeatureNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (FeatureId(index), node))
    }

    /// Evaluate a feature for the edge described by `ctx`.
    pub fn evaluate(&self, id: FeatureId, ctx: &EvalContext<'_>) -> Result<FeatureValue> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Constant(value) => Ok(*value),
            NodeKind::Distance => {
                let edge = require_edge(node, ctx)?;
                Ok(FeatureValue::Real(edge.source.distance_to(&edge.target)))
            }
            NodeKind::Gradient => {
                let edge = require_edge(node, ctx)?;
                Ok(FeatureValue::Real(edge.source.gradient_to(&edge.target)))
            }
            NodeKind::SlopeLimit { max } => {
                let gradient = self.dependency_real(node, 0, ctx)?;
                Ok(FeatureValue::Bool(gradient.abs() <= *max))
            }
            NodeKind::Reciprocal => {
                let value = self.dependency_real(node, 0, ctx)?;
                Ok(FeatureValue::Real(if value == 0.0 {
                    IMPASSABLE
                } else {
                    1.0 / value
                }))
            }
            NodeKind::Multiplier => multiplier::aggregate(self, node, ctx).map(FeatureValue::Real),
            NodeKind::GradientSpeed(curves) => {
                let gradient = self.dependency_real(node, 0, ctx)?;
                Ok(FeatureValue::Real(curves.speed_factor(gradient)))
            }
            NodeKind::Raster(layer) => {
                let edge = require_edge(node, ctx)?;
                layer.sample(&node.name, &edge.target).map(FeatureValue::Real)
            }
            NodeKind::HazardFree { min_severity } => {
                let EvalContext::State(state) = ctx else {
                    return Err(Error::ContextMismatch {
                        feature: node.name.clone(),
                        message: "route state is required".to_string(),
                    });
                };
                let edge = require_edge(node, ctx)?;
                let hazardous = edge
                    .face
                    .and_then(|face| state.warning_severity_at(face))
                    .is_some_and(|severity| severity >= *min_severity);
                Ok(FeatureValue::Bool(!hazardous))
            }
        }
    }

    /// Evaluate a feature that must produce a real.
    pub fn evaluate_real(&self, id: FeatureId, ctx: &EvalContext<'_>) -> Result<f64> {
        let value = self.evaluate(id, ctx)?;
        value.as_real().ok_or_else(|| self.type_error(id, ValueKind::Real, value))
    }

    /// Evaluate a feature that must produce an integer.
    pub fn evaluate_int(&self, id: FeatureId, ctx: &EvalContext<'_>) -> Result<i64> {
        let value = self.evaluate(id, ctx)?;
        value.as_int().ok_or_else(|| self.type_error(id, ValueKind::Int, value))
    }

    /// Evaluate a feature that must produce a boolean.
    pub fn evaluate_bool(&self, id: FeatureId, ctx: &EvalContext<'_>) -> Result<bool> {
        let value = self.evaluate(id, ctx)?;
        value.as_bool().ok_or_else(|| self.type_error(id, ValueKind::Bool, value))
    }

    fn dependency_real(
        &self,
        node: &FeatureNode,
        index: usize,
        ctx: &EvalContext<'_>,
    ) -> Result<f64> {
        let dependency = node
            .dependencies
            .get(index)
            .ok_or_else(|| Error::DependencyArity {
                feature: node.name.clone(),
                expected: index + 1,
                found: node.dependencies.len(),
            })?;
        self.evaluate_real(dependency.feature, ctx)
    }

    fn type_error(&self, id: FeatureId, expected: ValueKind, value: FeatureValue) -> Error {
        Error::FeatureType {
            feature: self
                .nodes
                .get(id.0)
                .map(|node| node.name.clone())
                .unwrap_or_else(|| format!("#{}", id.0)),
            expected,
            actual: value.kind(),
        }
    }
}

fn require_edge(node: &FeatureNode, ctx: &EvalContext<'_>) -> Result<EdgeGeometry> {
    ctx.edge().ok_or_else(|| Error::ContextMismatch {
        feature: node.name.clone(),
        message: "no edge is being priced".to_string(),
    })
}

/// A feature graph together with the node whose value is the edge cost.
#[derive(Debug, Clone)]
pub struct CostModel {
    graph: FeatureGraph,
    root: FeatureId,
}

impl CostModel {
    /// Wrap a validated graph. The root must produce a number.
    pub fn new(graph: FeatureGraph, root: FeatureId) -> Result<Self> {
        graph.validate()?;
        let node = graph.node(root)?;
        if node.kind.output_kind() == ValueKind::Bool {
            return Err(Error::InvalidFeatureConfig {
                message: format!("root feature {} must produce a number", node.name),
            });
        }
        Ok(Self { graph, root })
    }

    pub fn graph(&self) -> &FeatureGraph {
        &self.graph
    }

    pub fn root(&self) -> FeatureId {
        self.root
    }

    /// Cost of the edge described by `ctx`.
    pub fn cost(&self, ctx: &EvalContext<'_>) -> Result<f64> {
        match self.graph.evaluate(self.root, ctx)? {
            FeatureValue::Real(value) => Ok(value),
            FeatureValue::Int(value) => Ok(value as f64),
            value @ FeatureValue::Bool(_) => {
                Err(self.graph.type_error(self.root, ValueKind::Real, value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: Point3, target: Point3) -> EvalContext<'static> {
        EvalContext::Edge(EdgeGeometry {
            face: None,
            source,
            target,
        })
    }

    #[test]
    fn shared_dependency_is_evaluated_by_each_parent() {
        let mut graph = FeatureGraph::new();
        let gradient = graph.add("gradient", NodeKind::Gradient).unwrap();
        let limit = graph
            .add("limit", NodeKind::SlopeLimit { max: 0.5 })
            .unwrap();
        let speed = graph
            .add("speed", NodeKind::GradientSpeed(GradientCurves::default()))
            .unwrap();
        graph.add_dependency(limit, gradient).unwrap();
        graph.add_dependency(speed, gradient).unwrap();

        let ctx = edge(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 1.0));
        assert!(graph.evaluate_bool(limit, &ctx).unwrap());
        assert!(graph.evaluate_real(speed, &ctx).unwrap() > 0.0);
    }

    #[test]
    fn cycles_are_rejected_at_attach_time() {
        let mut graph = FeatureGraph::new();
        let a = graph.add("a", NodeKind::Reciprocal).unwrap();
        let b = graph.add("b", NodeKind::Reciprocal).unwrap();
        let c = graph.add("c", NodeKind::Reciprocal).unwrap();
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(b, c).unwrap();

        let err = graph.add_dependency(c, a).expect_err("c -> a closes a cycle");
        assert!(matches!(err, Error::DependencyCycle { .. }));
        let err = graph.add_dependency(a, a).expect_err("self loop");
        assert!(matches!(err, Error::DependencyCycle { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut graph = FeatureGraph::new();
        graph.add("distance", NodeKind::Distance).unwrap();
        let err = graph
            .add("distance", NodeKind::Gradient)
            .expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateFeature { .. }));
    }

    #[test]
    fn typed_accessor_rejects_wrong_tag() {
        let mut graph = FeatureGraph::new();
        let flag = graph
            .add("flag", NodeKind::Constant(FeatureValue::Bool(true)))
            .unwrap();
        let ctx = edge(Point3::default(), Point3::default());
        let err = graph.evaluate_real(flag, &ctx).expect_err("bool is not real");
        assert!(matches!(
            err,
            Error::FeatureType {
                expected: ValueKind::Real,
                actual: ValueKind::Bool,
                ..
            }
        ));
    }

    #[test]
    fn reciprocal_of_zero_is_impassable() {
        let mut graph = FeatureGraph::new();
        let zero = graph
            .add("zero", NodeKind::Constant(FeatureValue::Real(0.0)))
            .unwrap();
        let inverse = graph.add("inverse", NodeKind::Reciprocal).unwrap();
        graph.add_dependency(inverse, zero).unwrap();
        let ctx = edge(Point3::default(), Point3::default());
        assert_eq!(graph.evaluate_real(inverse, &ctx).unwrap(), IMPASSABLE);
    }

    #[test]
    fn validate_reports_missing_inputs() {
        let mut graph = FeatureGraph::new();
        graph.add("speed", NodeKind::GradientSpeed(GradientCurves::default())).unwrap();
        let err = graph.validate().expect_err("speed needs a gradient");
        assert!(matches!(
            err,
            Error::DependencyArity {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn hazard_gate_requires_route_state() {
        let mut graph = FeatureGraph::new();
        let gate = graph
            .add("safe", NodeKind::HazardFree { min_severity: 10 })
            .unwrap();
        let ctx = edge(Point3::default(), Point3::default());
        let err = graph.evaluate(gate, &ctx).expect_err("edge context only");
        assert!(matches!(err, Error::ContextMismatch { .. }));
    }

    #[test]
    fn boolean_root_is_not_a_cost() {
        let mut graph = FeatureGraph::new();
        let flag = graph
            .add("flag", NodeKind::Constant(FeatureValue::Bool(true)))
            .unwrap();
        assert!(CostModel::new(graph, flag).is_err());
    }
}
