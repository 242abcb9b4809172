//! Leaf features backed by an external tiled raster.
//!
//! Fetching, caching and retrying tiles is the source's business. A feature
//! only asks for the value of the tile containing the edge target, so from the
//! evaluator's point of view sampling stays side-effect free.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::mesh::Point3;

/// Tile coordinates, ordered by the layer's axis order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    coords: [i64; 3],
    len: usize,
}

impl TileKey {
    /// Build a key from one to three tile coordinates.
    pub fn new(coords: &[i64]) -> Result<Self> {
        if coords.is_empty() || coords.len() > 3 {
            return Err(Error::InvalidFeatureConfig {
                message: format!("raster tile {coords:?} must have 1 to 3 coordinates"),
            });
        }
        let mut key = Self {
            coords: [0; 3],
            len: coords.len(),
        };
        key.coords[..key.len].copy_from_slice(coords);
        Ok(key)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.coords[..self.len]
    }
}

/// Request handed to a [`RasterSource`].
#[derive(Debug, Clone, Copy)]
pub struct TileRequest<'a> {
    pub tile: TileKey,
    pub credential: Option<&'a str>,
}

/// External provider of tiled raster values.
pub trait RasterSource: Send + Sync + fmt::Debug {
    /// Value for the requested tile, or `None` when the tile has no data.
    fn sample(&self, request: &TileRequest<'_>) -> Option<f64>;
}

/// Raster held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRaster {
    tiles: HashMap<TileKey, f64>,
    dimensions: Option<usize>,
}

impl MemoryRaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a raster from `(tile, value)` pairs.
    pub fn from_tiles<I>(tiles: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Vec<i64>, f64)>,
    {
        let mut raster = Self::new();
        for (tile, value) in tiles {
            raster.insert(&tile, value)?;
        }
        Ok(raster)
    }

    /// Store a tile value. Every tile must have the same number of coordinates.
    pub fn insert(&mut self, tile: &[i64], value: f64) -> Result<()> {
        let key = TileKey::new(tile)?;
        match self.dimensions {
            Some(dimensions) if dimensions != key.len() => {
                return Err(Error::InvalidFeatureConfig {
                    message: format!(
                        "raster tile {tile:?} has {} coordinates, expected {dimensions}",
                        key.len()
                    ),
                })
            }
            _ => self.dimensions = Some(key.len()),
        }
        self.tiles.insert(key, value);
        Ok(())
    }

    /// Coordinates per tile, or `None` while the raster is empty.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl RasterSource for MemoryRaster {
    fn sample(&self, request: &TileRequest<'_>) -> Option<f64> {
        self.tiles.get(&request.tile).copied()
    }
}

/// How a feature maps mesh points onto a raster source.
#[derive(Clone)]
pub struct RasterLayer {
    source: Arc<dyn RasterSource>,
    tile_size: f64,
    axis_order: Vec<usize>,
    credential: Option<String>,
    fallback: Option<f64>,
}

impl RasterLayer {
    /// `axis_order` lists point axes (0 = x, 1 = y, 2 = z) in the order the
    /// source expects tile coordinates.
    pub fn new(
        source: Arc<dyn RasterSource>,
        tile_size: f64,
        axis_order: Vec<usize>,
    ) -> Result<Self> {
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return Err(Error::InvalidFeatureConfig {
                message: format!("raster tile size must be positive, got {tile_size}"),
            });
        }
        if axis_order.is_empty() || axis_order.len() > 3 || axis_order.iter().any(|&axis| axis > 2)
        {
            return Err(Error::InvalidFeatureConfig {
                message: format!("invalid raster axis order {axis_order:?}"),
            });
        }
        Ok(Self {
            source,
            tile_size,
            axis_order,
            credential: None,
            fallback: None,
        })
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Value used when the source has no data for a tile.
    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Number of coordinates in the tile keys this layer asks for.
    pub fn dimensions(&self) -> usize {
        self.axis_order.len()
    }

    /// Tile containing `point`.
    pub fn tile_key(&self, point: &Point3) -> TileKey {
        let mut coords = [0_i64; 3];
        for (slot, &axis) in coords.iter_mut().zip(&self.axis_order) {
            let value = match axis {
                0 => point.x,
                1 => point.y,
                _ => point.z,
            };
            *slot = (value / self.tile_size).floor() as i64;
        }
        TileKey {
            coords,
            len: self.axis_order.len(),
        }
    }

    pub(crate) fn sample(&self, feature: &str, point: &Point3) -> Result<f64> {
        let tile = self.tile_key(point);
        let request = TileRequest {
            tile,
            credential: self.credential.as_deref(),
        };
        self.source
            .sample(&request)
            .or(self.fallback)
            .ok_or_else(|| Error::RasterUnavailable {
                feature: feature.to_string(),
                tile: tile.as_slice().to_vec(),
            })
    }
}

impl fmt::Debug for RasterLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterLayer")
            .field("source", &self.source)
            .field("tile_size", &self.tile_size)
            .field("axis_order", &self.axis_order)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Named raster sources that feature configurations can refer to.
#[derive(Debug, Clone, Default)]
pub struct RasterSources {
    sources: HashMap<String, Arc<dyn RasterSource>>,
}

impl RasterSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, source: Arc<dyn RasterSource>) {
        self.sources.insert(name.into(), source);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn RasterSource>> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownRasterSource {
                name: name.to_string(),
            })
    }
}
