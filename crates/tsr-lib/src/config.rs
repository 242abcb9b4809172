//! JSON description of a feature graph.
//!
//! ```json
//! {
//!   "root": "cost",
//!   "features": [
//!     { "id": "distance", "type": "distance" },
//!     { "id": "cost", "type": "multiplier",
//!       "inputs": [{ "feature": "distance", "kind": "real" }] }
//!   ]
//! }
//! ```
//!
//! Features may only refer to features declared before them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::features::{
    CostModel, FeatureGraph, FeatureId, FeatureValue, GradientCurves, MemoryRaster, NodeKind,
    RasterLayer, RasterSources, ValueKind, IMPASSABLE,
};

/// Hiking cost model used when no configuration is supplied: edge length
/// divided by the gradient speed factor, closed above a 100% slope.
pub const DEFAULT_FEATURES: &str = r#"{
  "root": "cost",
  "features": [
    { "id": "distance", "type": "distance" },
    { "id": "gradient", "type": "gradient" },
    { "id": "speed", "type": "gradient_speed", "input": "gradient" },
    { "id": "pace", "type": "reciprocal", "input": "speed" },
    { "id": "walkable", "type": "slope_limit", "input": "gradient", "max": 1.0 },
    { "id": "cost", "type": "multiplier", "inputs": [
      { "feature": "walkable", "kind": "bool" },
      { "feature": "distance", "kind": "real" },
      { "feature": "pace", "kind": "real" }
    ] }
  ]
}"#;

/// Parsed feature graph document.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    pub root: String,
    pub features: Vec<FeatureSpec>,
    /// Rasters embedded in the document, registered by name.
    #[serde(default)]
    pub rasters: HashMap<String, RasterSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSpec {
    pub id: String,
    #[serde(flatten)]
    pub node: NodeSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSpec {
    /// Booleans and integers keep their type; `"impassable"` is infinity.
    Constant {
        value: Value,
    },
    Distance,
    Gradient,
    SlopeLimit {
        input: String,
        max: f64,
    },
    Reciprocal {
        input: String,
    },
    Multiplier {
        #[serde(default)]
        inputs: Vec<TypedInput>,
    },
    GradientSpeed {
        input: String,
        #[serde(default)]
        uphill: Option<Vec<f64>>,
        #[serde(default)]
        downhill: Option<Vec<f64>>,
    },
    Raster {
        source: String,
        tile_size: f64,
        #[serde(default = "default_axis_order")]
        axis_order: Vec<usize>,
        /// Name of an environment variable holding the access credential.
        #[serde(default)]
        credential_env: Option<String>,
        #[serde(default)]
        fallback: Option<f64>,
    },
    HazardFree {
        #[serde(default = "default_min_severity")]
        min_severity: u16,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypedInput {
    pub feature: String,
    #[serde(default)]
    pub kind: Option<ValueKind>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterSpec {
    pub tiles: Vec<TileSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TileSpec {
    pub tile: Vec<i64>,
    pub value: f64,
}

fn default_axis_order() -> Vec<usize> {
    vec![0, 1]
}

fn default_min_severity() -> u16 {
    crate::state::MIN_WARNING_SEVERITY
}

impl FeatureConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The built-in hiking configuration.
    pub fn hiking() -> Result<Self> {
        Self::from_json_str(DEFAULT_FEATURES)
    }

    /// Build the graph. `sources` supplies rasters not embedded in the document.
    pub fn build(&self, sources: &RasterSources) -> Result<CostModel> {
        let mut sources = sources.clone();
        let mut embedded = HashMap::new();
        for (name, spec) in &self.rasters {
            let tiles = spec.tiles.iter().map(|tile| (tile.tile.clone(), tile.value));
            let raster = MemoryRaster::from_tiles(tiles).map_err(|err| match err {
                Error::InvalidFeatureConfig { message } => Error::InvalidFeatureConfig {
                    message: format!("raster {name}: {message}"),
                },
                other => other,
            })?;
            embedded.insert(name.as_str(), raster.dimensions());
            sources.register(name.clone(), Arc::new(raster));
        }

        let mut graph = FeatureGraph::new();
        for spec in &self.features {
            let kind = spec.node.to_kind(&sources)?;
            if let (NodeSpec::Raster { source, .. }, NodeKind::Raster(layer)) = (&spec.node, &kind)
            {
                if let Some(&Some(dimensions)) = embedded.get(source.as_str()) {
                    check_tile_dimensions(&spec.id, layer, source, dimensions)?;
                }
            }
            let id = graph.add(spec.id.clone(), kind)?;
            match &spec.node {
                NodeSpec::SlopeLimit { input, .. }
                | NodeSpec::Reciprocal { input }
                | NodeSpec::GradientSpeed { input, .. } => {
                    let child = resolve(&graph, input)?;
                    graph.add_dependency(id, child)?;
                }
                NodeSpec::Multiplier { inputs } => {
                    for input in inputs {
                        let child = resolve(&graph, &input.feature)?;
                        match input.kind {
                            Some(kind) => graph.add_typed_dependency(id, child, kind)?,
                            None => graph.add_dependency(id, child)?,
                        }
                    }
                }
                NodeSpec::Constant { .. }
                | NodeSpec::Distance
                | NodeSpec::Gradient
                | NodeSpec::Raster { .. }
                | NodeSpec::HazardFree { .. } => {}
            }
        }

        let root = resolve(&graph, &self.root)?;
        debug!(features = graph.len(), root = %self.root, "built feature graph");
        CostModel::new(graph, root)
    }
}

impl NodeSpec {
    fn to_kind(&self, sources: &RasterSources) -> Result<NodeKind> {
        let kind = match self {
            NodeSpec::Constant { value } => NodeKind::Constant(constant_value(value)?),
            NodeSpec::Distance => NodeKind::Distance,
            NodeSpec::Gradient => NodeKind::Gradient,
            NodeSpec::SlopeLimit { max, .. } => NodeKind::SlopeLimit { max: *max },
            NodeSpec::Reciprocal { .. } => NodeKind::Reciprocal,
            NodeSpec::Multiplier { .. } => NodeKind::Multiplier,
            NodeSpec::GradientSpeed {
                uphill, downhill, ..
            } => {
                let defaults = GradientCurves::default();
                NodeKind::GradientSpeed(GradientCurves::new(
                    uphill.clone().unwrap_or(defaults.uphill),
                    downhill.clone().unwrap_or(defaults.downhill),
                ))
            }
            NodeSpec::Raster {
                source,
                tile_size,
                axis_order,
                credential_env,
                fallback,
            } => {
                let mut layer =
                    RasterLayer::new(sources.get(source)?, *tile_size, axis_order.clone())?;
                if let Some(variable) = credential_env {
                    let credential =
                        std::env::var(variable).map_err(|_| Error::InvalidFeatureConfig {
                            message: format!("credential variable {variable} is not set"),
                        })?;
                    layer = layer.with_credential(credential);
                }
                if let Some(fallback) = fallback {
                    layer = layer.with_fallback(*fallback);
                }
                NodeKind::Raster(layer)
            }
            NodeSpec::HazardFree { min_severity } => NodeKind::HazardFree {
                min_severity: *min_severity,
            },
        };
        Ok(kind)
    }
}

/// Embedded tiles must match the layer's axis order or they can never be sampled.
fn check_tile_dimensions(
    feature: &str,
    layer: &RasterLayer,
    source: &str,
    dimensions: usize,
) -> Result<()> {
    if dimensions == layer.dimensions() {
        return Ok(());
    }
    Err(Error::InvalidFeatureConfig {
        message: format!(
            "feature {feature} reads {}-coordinate tiles but raster {source} has {dimensions}",
            layer.dimensions()
        ),
    })
}

fn resolve(graph: &FeatureGraph, name: &str) -> Result<FeatureId> {
    graph.id(name).ok_or_else(|| Error::UnknownFeature {
        name: name.to_string(),
    })
}

fn constant_value(value: &Value) -> Result<FeatureValue> {
    match value {
        Value::Bool(flag) => Ok(FeatureValue::Bool(*flag)),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(FeatureValue::Int(integer))
            } else {
                number
                    .as_f64()
                    .map(FeatureValue::Real)
                    .ok_or_else(|| Error::InvalidFeatureConfig {
                        message: format!("constant {number} is out of range"),
                    })
            }
        }
        Value::String(text) if text == "impassable" => Ok(FeatureValue::Real(IMPASSABLE)),
        other => Err(Error::InvalidFeatureConfig {
            message: format!("unsupported constant value {other}"),
        }),
    }
}
