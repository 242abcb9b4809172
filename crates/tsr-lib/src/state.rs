//! Route and warning state shared between the search and its consumers.
//!
//! A [`RouteState`] accumulates the parent-pointer tree written by the search
//! and the hazard annotations seeded by the detector. Once the goal has been
//! reached it is consumed by [`RouteState::finalize`], which reconstructs the
//! path and keeps only the warnings that matter for it.

use std::cmp::Reverse;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::features::{EdgeGeometry, GradientCurves};
use crate::mesh::{FaceId, Geometry, Point3, VertexId};

/// Identifier of a hazard warning. `0` means "no warning".
pub type WarningId = u32;

/// Warning id stored for faces without a hazard.
pub const NO_WARNING: WarningId = 0;

/// Warnings below this severity are not reported next to a route.
pub const MIN_WARNING_SEVERITY: u16 = 10;

/// Cheapest known way into a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Node {
    pub vertex: VertexId,
    pub parent: VertexId,
    /// Cumulative cost from the start vertex.
    pub g_cost: f64,
    /// Face crossed by the edge from `parent`, if any.
    pub face: Option<FaceId>,
}

impl Node {
    pub fn new(vertex: VertexId, parent: VertexId, g_cost: f64, face: Option<FaceId>) -> Self {
        Self {
            vertex,
            parent,
            g_cost,
            face,
        }
    }

    /// Root of the parent tree: its own parent, zero cost.
    pub fn root(vertex: VertexId) -> Self {
        Self::new(vertex, vertex, 0.0, None)
    }
}

/// Hazard annotation as produced by a detector or a mesh document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningSeed {
    pub id: WarningId,
    pub severity: u16,
    pub message: String,
    #[serde(default)]
    pub faces: Vec<FaceId>,
}

/// Mutable state of one route computation.
#[derive(Debug, Clone)]
pub struct RouteState {
    start_vertex: VertexId,
    end_vertex: VertexId,
    routes: HashMap<VertexId, Node>,
    warnings: HashMap<FaceId, WarningId>,
    warning_priorities: HashMap<WarningId, u16>,
    warning_messages: HashMap<WarningId, String>,
    current_edge: Option<EdgeGeometry>,
}

impl RouteState {
    /// Create a state whose parent tree holds only the start vertex.
    pub fn new(start_vertex: VertexId, end_vertex: VertexId) -> Self {
        let mut routes = HashMap::new();
        routes.insert(start_vertex, Node::root(start_vertex));
        Self {
            start_vertex,
            end_vertex,
            routes,
            warnings: HashMap::new(),
            warning_priorities: HashMap::new(),
            warning_messages: HashMap::new(),
            current_edge: None,
        }
    }

    pub fn start_vertex(&self) -> VertexId {
        self.start_vertex
    }

    pub fn end_vertex(&self) -> VertexId {
        self.end_vertex
    }

    pub fn routes(&self) -> &HashMap<VertexId, Node> {
        &self.routes
    }

    pub fn node(&self, vertex: VertexId) -> Option<&Node> {
        self.routes.get(&vertex)
    }

    /// Record `node` if it is strictly cheaper than what is known for its
    /// vertex. Returns whether the entry was written.
    pub fn relax(&mut self, node: Node) -> bool {
        match self.routes.get(&node.vertex) {
            Some(existing) if existing.g_cost <= node.g_cost => false,
            _ => {
                self.routes.insert(node.vertex, node);
                true
            }
        }
    }

    /// Write `node` unconditionally, replacing any previous entry.
    pub fn insert_node(&mut self, node: Node) {
        self.routes.insert(node.vertex, node);
    }

    /// Edge currently being priced; read by state-context features.
    pub fn current_edge(&self) -> Option<EdgeGeometry> {
        self.current_edge
    }

    pub fn set_current_edge(&mut self, edge: Option<EdgeGeometry>) {
        self.current_edge = edge;
    }

    /// Register a warning with its severity and message.
    pub fn define_warning(
        &mut self,
        id: WarningId,
        severity: u16,
        message: impl Into<String>,
    ) -> Result<()> {
        if id == NO_WARNING {
            return Err(Error::ReservedWarningId);
        }
        self.warning_priorities.insert(id, severity);
        self.warning_messages.insert(id, message.into());
        Ok(())
    }

    /// Attach a warning to a face. Marking with [`NO_WARNING`] clears it.
    pub fn mark_face(&mut self, face: FaceId, id: WarningId) {
        if id == NO_WARNING {
            self.warnings.remove(&face);
        } else {
            self.warnings.insert(face, id);
        }
    }

    /// Define and attach every warning in `seeds`.
    pub fn seed_warnings(&mut self, seeds: &[WarningSeed]) -> Result<()> {
        for seed in seeds {
            self.define_warning(seed.id, seed.severity, seed.message.clone())?;
            for &face in &seed.faces {
                self.mark_face(face, seed.id);
            }
        }
        Ok(())
    }

    /// Warning id attached to `face`, or [`NO_WARNING`].
    pub fn warning_at(&self, face: FaceId) -> WarningId {
        self.warnings.get(&face).copied().unwrap_or(NO_WARNING)
    }

    /// Severity of the warning attached to `face`, if any.
    pub fn warning_severity_at(&self, face: FaceId) -> Option<u16> {
        match self.warning_at(face) {
            NO_WARNING => None,
            id => Some(self.severity(id)),
        }
    }

    pub fn warnings(&self) -> &HashMap<FaceId, WarningId> {
        &self.warnings
    }

    pub fn warning_message(&self, id: WarningId) -> Option<&str> {
        self.warning_messages.get(&id).map(String::as_str)
    }

    fn severity(&self, id: WarningId) -> u16 {
        self.warning_priorities.get(&id).copied().unwrap_or(0)
    }

    /// Vertices from start to end, recovered by walking parents back from the end.
    pub fn reconstruct_vertices(&self) -> Result<Vec<VertexId>> {
        let mut vertex = self.end_vertex;
        let mut node = self.routes.get(&vertex).ok_or(Error::RouteNotFound {
            start: self.start_vertex,
            end: self.end_vertex,
        })?;
        trace!(vertex, cost = node.g_cost, "route end");

        // Every vertex appears at most once on a sound chain.
        let limit = self.routes.len();
        let mut path = vec![vertex];
        let mut steps = 0;
        while vertex != self.start_vertex {
            if steps >= limit {
                return Err(Error::CorruptParentChain { vertex, steps });
            }
            vertex = node.parent;
            node = self
                .routes
                .get(&vertex)
                .ok_or(Error::CorruptParentChain { vertex, steps })?;
            trace!(vertex, cost = node.g_cost, "route step");
            path.push(vertex);
            steps += 1;
        }

        path.reverse();
        Ok(path)
    }

    /// Points of the route from start to end.
    pub fn reconstruct_path<G: Geometry + ?Sized>(&self, geometry: &G) -> Result<Vec<Point3>> {
        self.reconstruct_vertices()?
            .into_iter()
            .map(|vertex| geometry.point(vertex).ok_or(Error::UnknownVertex { vertex }))
            .collect()
    }

    /// Replace the warnings with the most severe warning next to each route
    /// vertex (start excluded), dropping anything below
    /// [`MIN_WARNING_SEVERITY`]. The state is untouched if the route cannot
    /// be reconstructed.
    pub fn filter_warnings<G: Geometry + ?Sized>(&mut self, geometry: &G) -> Result<()> {
        let path = self.reconstruct_vertices()?;
        let selected = self.route_warnings(&path, geometry);
        debug!(
            before = self.warnings.len(),
            after = selected.len(),
            "filtered route warnings"
        );
        self.warnings = selected;
        Ok(())
    }

    fn route_warnings<G: Geometry + ?Sized>(
        &self,
        path: &[VertexId],
        geometry: &G,
    ) -> HashMap<FaceId, WarningId> {
        let mut selected = HashMap::new();
        for &vertex in path.iter().skip(1) {
            let mut strongest: Option<(FaceId, u16)> = None;
            for &face in geometry.incident_faces(vertex) {
                let Some(severity) = self.warning_severity_at(face) else {
                    continue;
                };
                // Strictly greater: the first face seen wins a tie.
                if severity > strongest.map_or(0, |(_, max)| max) {
                    strongest = Some((face, severity));
                }
            }

            if let Some((face, severity)) = strongest {
                if severity >= MIN_WARNING_SEVERITY {
                    selected.insert(face, self.warning_at(face));
                }
            }
        }
        selected
    }

    /// Filter warnings and reconstruct the route, producing a read-only result.
    pub fn finalize<G: Geometry + ?Sized>(mut self, geometry: &G) -> Result<FinalizedRoute> {
        self.filter_warnings(geometry)?;
        let vertices = self.reconstruct_vertices()?;
        let points = vertices
            .iter()
            .map(|&vertex| geometry.point(vertex).ok_or(Error::UnknownVertex { vertex }))
            .collect::<Result<Vec<_>>>()?;
        let total_cost = self
            .routes
            .get(&self.end_vertex)
            .map(|node| node.g_cost)
            .unwrap_or_default();

        let warnings = self.warning_records(geometry);
        debug!(
            vertices = vertices.len(),
            warnings = warnings.len(),
            total_cost,
            "finalized route"
        );

        Ok(FinalizedRoute {
            start_vertex: self.start_vertex,
            end_vertex: self.end_vertex,
            vertices,
            points,
            total_cost,
            warnings,
        })
    }

    /// Consume a state whose search failed, keeping every seeded warning.
    ///
    /// There is no path to filter against, so nothing is dropped: low
    /// severity warnings are reported too.
    pub fn into_failure<G: Geometry + ?Sized>(self, geometry: &G, reason: &Error) -> FailedRoute {
        let warnings = self.warning_records(geometry);
        debug!(warnings = warnings.len(), %reason, "recorded failed route");
        FailedRoute {
            start_vertex: self.start_vertex,
            end_vertex: self.end_vertex,
            reason: reason.to_string(),
            warnings,
        }
    }

    fn warning_records<G: Geometry + ?Sized>(&self, geometry: &G) -> Vec<RouteWarning> {
        let mut warnings = self
            .warnings
            .iter()
            .map(|(&face, &id)| RouteWarning {
                face,
                id,
                severity: self.severity(id),
                message: self.warning_message(id).unwrap_or_default().to_string(),
                location: geometry.face_circumcenter(face),
            })
            .collect::<Vec<_>>();
        warnings.sort_by_key(|warning| (Reverse(warning.severity), warning.face));
        warnings
    }
}

/// Warning kept next to a finalized route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteWarning {
    pub face: FaceId,
    pub id: WarningId,
    pub severity: u16,
    pub message: String,
    /// Circumcenter of the face.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Point3>,
}

/// What is left of a route computation that found no path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRoute {
    pub start_vertex: VertexId,
    pub end_vertex: VertexId,
    pub reason: String,
    /// Every warning seeded into the state, unfiltered.
    pub warnings: Vec<RouteWarning>,
}

/// Read-only outcome of a successful route computation.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedRoute {
    start_vertex: VertexId,
    end_vertex: VertexId,
    vertices: Vec<VertexId>,
    points: Vec<Point3>,
    total_cost: f64,
    warnings: Vec<RouteWarning>,
}

impl FinalizedRoute {
    pub fn start_vertex(&self) -> VertexId {
        self.start_vertex
    }

    pub fn end_vertex(&self) -> VertexId {
        self.end_vertex
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Warnings ordered by decreasing severity, then face.
    pub fn warnings(&self) -> &[RouteWarning] {
        &self.warnings
    }

    /// Walking length of the route.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }

    /// Travel time in seconds at `base_speed` (m/s) scaled by the gradient curves.
    ///
    /// A segment whose speed factor is zero makes the estimate infinite.
    pub fn estimated_duration(&self, curves: &GradientCurves, base_speed: f64) -> f64 {
        self.points
            .windows(2)
            .map(|pair| {
                let speed = base_speed * curves.speed_factor(pair[0].gradient_to(&pair[1]));
                let length = pair[0].distance_to(&pair[1]);
                if length == 0.0 {
                    0.0
                } else if speed > 0.0 {
                    length / speed
                } else {
                    f64::INFINITY
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relax_keeps_the_cheapest_entry() {
        let mut state = RouteState::new(0, 2);
        assert!(state.relax(Node::new(1, 0, 5.0, None)));
        assert!(!state.relax(Node::new(1, 0, 7.0, None)));
        assert!(!state.relax(Node::new(1, 0, 5.0, None)));
        assert!(state.relax(Node::new(1, 3, 4.0, None)));
        assert_eq!(state.node(1).map(|node| node.parent), Some(3));
    }

    #[test]
    fn reserved_warning_id_is_rejected() {
        let mut state = RouteState::new(0, 0);
        assert!(matches!(
            state.define_warning(NO_WARNING, 20, "nothing"),
            Err(Error::ReservedWarningId)
        ));
    }

    #[test]
    fn marking_with_zero_clears_a_face() {
        let mut state = RouteState::new(0, 0);
        state.define_warning(4, 11, "scree").unwrap();
        state.mark_face(9, 4);
        assert_eq!(state.warning_severity_at(9), Some(11));
        state.mark_face(9, NO_WARNING);
        assert_eq!(state.warning_at(9), NO_WARNING);
        assert!(state.warnings().is_empty());
    }

    #[test]
    fn start_node_is_its_own_parent() {
        let state = RouteState::new(7, 8);
        assert_eq!(state.node(7), Some(&Node::root(7)));
        assert_eq!(state.routes().len(), 1);
    }
}
