//! Least-cost search over mesh vertices.
//!
//! Edges are priced by a [`CostModel`] evaluated against the route state, and
//! every improvement is written into the state's parent tree. The route itself
//! is recovered later by [`RouteState::finalize`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::features::{CostModel, EdgeGeometry, EvalContext};
use crate::mesh::{Geometry, TriangleMesh, VertexId};
use crate::state::{Node, RouteState};

/// Limits applied while searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Maximum number of vertices expanded before giving up.
    pub max_expansions: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_expansions: 5_000_000,
        }
    }
}

/// Counters collected during a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub expansions: usize,
    pub evaluated_edges: usize,
}

/// Whether an edge cost can be traversed. Impassable (infinite) and gated
/// (zero) costs cannot, nor can anything negative or NaN.
pub fn is_passable(cost: f64) -> bool {
    cost.is_finite() && cost > 0.0
}

/// Run Dijkstra's algorithm from the state's start to its end vertex.
///
/// On success the state's parent tree contains the end vertex.
pub fn find_route(
    mesh: &TriangleMesh,
    model: &CostModel,
    state: &mut RouteState,
    options: &SearchOptions,
) -> Result<SearchStats> {
    let outcome = run_dijkstra(mesh, model, state, options);
    state.set_current_edge(None);
    outcome
}

fn run_dijkstra(
    mesh: &TriangleMesh,
    model: &CostModel,
    state: &mut RouteState,
    options: &SearchOptions,
) -> Result<SearchStats> {
    let start = state.start_vertex();
    let goal = state.end_vertex();
    for vertex in [start, goal] {
        if mesh.point(vertex).is_none() {
            return Err(Error::UnknownVertex { vertex });
        }
    }

    let mut stats = SearchStats::default();
    let mut settled = vec![false; mesh.vertex_count()];
    let mut queue = BinaryHeap::new();
    queue.push(QueueEntry::new(start, 0.0));

    while let Some(entry) = queue.pop() {
        if settled[entry.node] {
            continue;
        }
        let current_cost = match state.node(entry.node) {
            Some(node) if node.g_cost < entry.cost.0 => continue,
            Some(node) => node.g_cost,
            None => continue,
        };
        settled[entry.node] = true;

        if entry.node == goal {
            debug!(
                expansions = stats.expansions,
                evaluated_edges = stats.evaluated_edges,
                cost = current_cost,
                "search reached goal"
            );
            return Ok(stats);
        }

        stats.expansions += 1;
        if stats.expansions > options.max_expansions {
            warn!(
                expansions = stats.expansions,
                "search expansion budget exhausted"
            );
            return Err(Error::SearchExhausted {
                expansions: stats.expansions,
            });
        }

        let source = mesh
            .point(entry.node)
            .ok_or(Error::UnknownVertex { vertex: entry.node })?;
        for neighbour in mesh.neighbours(entry.node) {
            if settled[neighbour.vertex] {
                continue;
            }
            let target = mesh.point(neighbour.vertex).ok_or(Error::UnknownVertex {
                vertex: neighbour.vertex,
            })?;

            state.set_current_edge(Some(EdgeGeometry {
                face: Some(neighbour.face),
                source,
                target,
            }));
            let cost = model.cost(&EvalContext::State(&*state))?;
            stats.evaluated_edges += 1;
            if !is_passable(cost) {
                continue;
            }

            let next_cost = current_cost + cost;
            let node = Node::new(neighbour.vertex, entry.node, next_cost, Some(neighbour.face));
            if state.relax(node) {
                queue.push(QueueEntry::new(neighbour.vertex, next_cost));
            }
        }
    }

    debug!(
        expansions = stats.expansions,
        "search frontier emptied before reaching goal"
    );
    Err(Error::RouteNotFound { start, end: goal })
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    node: VertexId,
    cost: FloatOrd,
}

impl QueueEntry {
    fn new(node: VertexId, cost: f64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by cost.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
