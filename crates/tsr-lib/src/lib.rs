//! Terrain route library.
//!
//! Routes are found on a triangulated terrain mesh. Edge costs come from a
//! configurable feature graph ([`features`]), the search writes its parent
//! tree into a [`RouteState`], and the state is finalized into a read-only
//! [`FinalizedRoute`] carrying the path and the hazard warnings next to it.
//! Higher-level consumers (the CLI) should only depend on what is exported
//! here.

pub mod config;
pub mod error;
pub mod features;
pub mod mesh;
pub mod output;
pub mod search;
pub mod state;

pub use config::{FeatureConfig, DEFAULT_FEATURES};
pub use error::{Error, Result};
pub use features::{
    CostModel, EdgeGeometry, EvalContext, FeatureGraph, FeatureId, FeatureValue, GradientCurves,
    NodeKind, RasterSources, ValueKind, IMPASSABLE,
};
pub use mesh::{Geometry, Point3, TriangleMesh, VertexId};
pub use output::{FailureSummary, RouteRenderMode, RouteSummary};
pub use search::{find_route, SearchOptions, SearchStats};
pub use state::{FailedRoute, FinalizedRoute, Node, RouteState, RouteWarning, WarningSeed};

/// Result of [`route_or_report`].
#[derive(Debug)]
pub enum RouteOutcome {
    Found(FinalizedRoute),
    /// The search finished without reaching the end vertex. `report` keeps
    /// the seeded warnings so the failure can still be exported.
    Unreachable { error: Error, report: FailedRoute },
}

/// Search `mesh` from `start` to `end` and finalize the result.
///
/// Hazard warnings stored on the mesh are seeded into the state before the
/// search, so hazard gates in the cost model see them.
pub fn plan_route(
    mesh: &TriangleMesh,
    model: &CostModel,
    start: VertexId,
    end: VertexId,
    options: &SearchOptions,
) -> Result<FinalizedRoute> {
    match route_or_report(mesh, model, start, end, options)? {
        RouteOutcome::Found(route) => Ok(route),
        RouteOutcome::Unreachable { error, .. } => Err(error),
    }
}

/// Like [`plan_route`], but an unreachable end vertex yields a
/// [`FailedRoute`] with every seeded warning instead of a bare error.
///
/// Configuration and data errors are still returned as `Err`.
pub fn route_or_report(
    mesh: &TriangleMesh,
    model: &CostModel,
    start: VertexId,
    end: VertexId,
    options: &SearchOptions,
) -> Result<RouteOutcome> {
    let mut state = RouteState::new(start, end);
    state.seed_warnings(mesh.hazards())?;
    match find_route(mesh, model, &mut state, options) {
        Ok(stats) => {
            tracing::info!(
                start,
                end,
                expansions = stats.expansions,
                evaluated_edges = stats.evaluated_edges,
                "route found"
            );
            Ok(RouteOutcome::Found(state.finalize(mesh)?))
        }
        Err(error @ (Error::RouteNotFound { .. } | Error::SearchExhausted { .. })) => {
            tracing::info!(start, end, %error, "no route");
            let report = state.into_failure(mesh, &error);
            Ok(RouteOutcome::Unreachable { error, report })
        }
        Err(error) => Err(error),
    }
}
