#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use tsr_lib::mesh::FaceId;
use tsr_lib::{Geometry, Point3, TriangleMesh, VertexId};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// Square grid of `size x size` vertices spaced `spacing` metres apart.
///
/// Vertex `row * size + col` sits at `(col, row) * spacing` with height
/// `height(row, col)`. Each cell is split along its rising diagonal, giving
/// faces `[a, a + 1, a + size + 1]` then `[a, a + size + 1, a + size]`.
pub fn grid_mesh(size: usize, spacing: f64, height: impl Fn(usize, usize) -> f64) -> TriangleMesh {
    let mut vertices = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            vertices.push(Point3::new(
                col as f64 * spacing,
                row as f64 * spacing,
                height(row, col),
            ));
        }
    }

    let mut faces = Vec::new();
    for row in 0..size - 1 {
        for col in 0..size - 1 {
            let a = row * size + col;
            faces.push([a, a + 1, a + size + 1]);
            faces.push([a, a + size + 1, a + size]);
        }
    }
    TriangleMesh::new(vertices, faces).expect("grid mesh is valid")
}

pub fn flat_grid(size: usize) -> TriangleMesh {
    grid_mesh(size, 10.0, |_, _| 0.0)
}

/// Hand-wired topology for route-state tests: every vertex lists its
/// incident faces explicitly and sits on the x axis.
#[derive(Debug, Default)]
pub struct FakeTopology {
    incident: HashMap<VertexId, Vec<FaceId>>,
}

impl FakeTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faces(mut self, vertex: VertexId, faces: &[FaceId]) -> Self {
        self.incident.insert(vertex, faces.to_vec());
        self
    }
}

impl Geometry for FakeTopology {
    fn point(&self, vertex: VertexId) -> Option<Point3> {
        Some(Point3::new(vertex as f64, 0.0, 0.0))
    }

    fn incident_faces(&self, vertex: VertexId) -> &[FaceId] {
        self.incident.get(&vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    fn face_vertices(&self, _face: FaceId) -> Option<[VertexId; 3]> {
        None
    }
}
