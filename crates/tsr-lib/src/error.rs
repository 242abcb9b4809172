use thiserror::Error;

use crate::features::ValueKind;
use crate::mesh::VertexId;

/// Convenient result alias for the terrain surface router.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a feature id or index does not exist in the graph.
    #[error("unknown feature: {name}")]
    UnknownFeature { name: String },

    /// Raised when two features are registered under the same id.
    #[error("feature {name} is already defined")]
    DuplicateFeature { name: String },

    /// Raised when a multiplier receives a dependency without a declared kind.
    #[error("feature {feature} requires an explicit kind for every dependency")]
    UntypedDependency { feature: String },

    /// Raised when the declared kind of a dependency disagrees with what it produces.
    #[error("dependency {dependency} of {feature} declared as {declared} but produces {actual}")]
    DependencyKindMismatch {
        feature: String,
        dependency: String,
        declared: ValueKind,
        actual: ValueKind,
    },

    /// Raised when attaching a dependency would close a cycle.
    #[error("attaching {dependency} to {feature} would create a dependency cycle")]
    DependencyCycle { feature: String, dependency: String },

    /// Raised when a node has the wrong number of dependencies for its kind.
    #[error("feature {feature} expects {expected} dependencies, found {found}")]
    DependencyArity {
        feature: String,
        expected: usize,
        found: usize,
    },

    /// Raised when a multiplier meets a dependency whose kind was never recorded.
    #[error("dependency {dependency} of {feature} has no recorded kind")]
    MissingDependencyKind { feature: String, dependency: String },

    /// Raised when an evaluated value does not carry the expected type tag.
    #[error("feature {feature} produced {actual} where {expected} was expected")]
    FeatureType {
        feature: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Raised when a feature is evaluated in a context that cannot serve it.
    #[error("feature {feature} cannot be evaluated: {message}")]
    ContextMismatch { feature: String, message: String },

    /// Raised when a raster layer has no value for a tile and no fallback.
    #[error("raster {feature} has no value for tile {tile:?}")]
    RasterUnavailable { feature: String, tile: Vec<i64> },

    /// Raised when a feature configuration names a raster source that was not registered.
    #[error("raster source {name} is not registered")]
    UnknownRasterSource { name: String },

    /// Raised when a feature configuration document is structurally invalid.
    #[error("invalid feature configuration: {message}")]
    InvalidFeatureConfig { message: String },

    /// Raised when warning id 0, which means "no warning", is used as a real warning.
    #[error("warning id 0 is reserved for faces without a warning")]
    ReservedWarningId,

    /// Raised when no route reached the end vertex.
    #[error("no route found between vertex {start} and vertex {end}")]
    RouteNotFound { start: VertexId, end: VertexId },

    /// Raised when the parent chain does not lead back to the start vertex.
    #[error("parent chain is corrupt at vertex {vertex} after {steps} steps")]
    CorruptParentChain { vertex: VertexId, steps: usize },

    /// Raised when the search hits its expansion budget before reaching the goal.
    #[error("search gave up after {expansions} expansions")]
    SearchExhausted { expansions: usize },

    /// Raised when a vertex handle is not known to the geometry provider.
    #[error("unknown vertex: {vertex}")]
    UnknownVertex { vertex: VertexId },

    /// Raised when a mesh document is inconsistent.
    #[error("invalid mesh: {message}")]
    InvalidMesh { message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON parsing errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error describes a one-time setup mistake rather than a
    /// property of the terrain data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownFeature { .. }
                | Error::DuplicateFeature { .. }
                | Error::UntypedDependency { .. }
                | Error::DependencyKindMismatch { .. }
                | Error::DependencyCycle { .. }
                | Error::DependencyArity { .. }
                | Error::MissingDependencyKind { .. }
                | Error::FeatureType { .. }
                | Error::ContextMismatch { .. }
                | Error::UnknownRasterSource { .. }
                | Error::InvalidFeatureConfig { .. }
                | Error::ReservedWarningId
        )
    }
}
