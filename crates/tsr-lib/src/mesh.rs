//! Triangulated terrain surface and the geometry provider contract.

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::state::WarningSeed;

/// Index of a vertex owned by the geometry provider.
pub type VertexId = usize;

/// Index of a triangular face owned by the geometry provider.
pub type FaceId = usize;

/// Cartesian coordinates of a mesh vertex (projected metres, `z` up).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Calculate the Euclidean distance to another point.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance to another point projected onto the horizontal plane.
    pub fn horizontal_distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Signed rise over run towards `other`; uphill is positive.
    ///
    /// A purely vertical step yields an infinite gradient and two coincident
    /// points yield `0.0`.
    pub fn gradient_to(&self, other: &Self) -> f64 {
        let rise = other.z - self.z;
        let run = self.horizontal_distance_to(other);
        if run == 0.0 {
            return match rise.partial_cmp(&0.0) {
                Some(Ordering::Greater) => f64::INFINITY,
                Some(Ordering::Less) => f64::NEG_INFINITY,
                _ => 0.0,
            };
        }
        rise / run
    }

    fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(v: [f64; 3]) -> Self {
        Point3::new(v[0], v[1], v[2])
    }
}

/// Centre of the circle through three points in 3D.
///
/// Degenerate (collinear) triangles fall back to the centroid.
pub fn circumcenter(a: &Point3, b: &Point3, c: &Point3) -> Point3 {
    let ab = b.sub(a);
    let ac = c.sub(a);
    let normal = ab.cross(&ac);
    let denominator = 2.0 * normal.norm_squared();
    if denominator == 0.0 {
        return Point3::new(
            (a.x + b.x + c.x) / 3.0,
            (a.y + b.y + c.y) / 3.0,
            (a.z + b.z + c.z) / 3.0,
        );
    }

    let left = normal.cross(&ab);
    let right = ac.cross(&normal);
    let ac2 = ac.norm_squared();
    let ab2 = ab.norm_squared();
    Point3::new(
        a.x + (ac2 * left.x + ab2 * right.x) / denominator,
        a.y + (ac2 * left.y + ab2 * right.y) / denominator,
        a.z + (ac2 * left.z + ab2 * right.z) / denominator,
    )
}

/// Read-only view of a triangulated surface.
///
/// Route state only stores handles; implementors own the geometry and must
/// outlive any state that refers to it.
pub trait Geometry {
    /// Coordinates of a vertex, or `None` for an unknown handle.
    fn point(&self, vertex: VertexId) -> Option<Point3>;

    /// Faces incident to `vertex`, in circulator order.
    fn incident_faces(&self, vertex: VertexId) -> &[FaceId];

    /// The three corners of a face.
    fn face_vertices(&self, face: FaceId) -> Option<[VertexId; 3]>;

    /// Circumcenter of a face, used to place warnings.
    fn face_circumcenter(&self, face: FaceId) -> Option<Point3> {
        let [a, b, c] = self.face_vertices(face)?;
        Some(circumcenter(
            &self.point(a)?,
            &self.point(b)?,
            &self.point(c)?,
        ))
    }
}

/// Directed edge from a vertex towards one of its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbour {
    pub vertex: VertexId,
    /// First face found that contains the edge.
    pub face: FaceId,
}

/// In-memory triangle mesh with prebuilt incidence tables.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    vertices: Vec<Point3>,
    faces: Vec<[VertexId; 3]>,
    incident: Vec<Vec<FaceId>>,
    adjacency: Vec<Vec<Neighbour>>,
    hazards: Vec<WarningSeed>,
}

#[derive(Debug, Deserialize)]
struct MeshDocument {
    vertices: Vec<[f64; 3]>,
    faces: Vec<[VertexId; 3]>,
    #[serde(default)]
    warnings: Vec<WarningSeed>,
}

impl TriangleMesh {
    /// Build a mesh from vertex coordinates and triangle corner indices.
    pub fn new(vertices: Vec<Point3>, faces: Vec<[VertexId; 3]>) -> Result<Self> {
        for (index, face) in faces.iter().enumerate() {
            if let Some(&vertex) = face.iter().find(|&&v| v >= vertices.len()) {
                return Err(Error::InvalidMesh {
                    message: format!("face {index} references unknown vertex {vertex}"),
                });
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(Error::InvalidMesh {
                    message: format!("face {index} repeats a vertex: {face:?}"),
                });
            }
        }

        let mut incident: Vec<Vec<FaceId>> = vec![Vec::new(); vertices.len()];
        let mut adjacency: Vec<Vec<Neighbour>> = vec![Vec::new(); vertices.len()];
        for (face_id, face) in faces.iter().enumerate() {
            for (i, &vertex) in face.iter().enumerate() {
                incident[vertex].push(face_id);
                for &other in face.iter().skip(i + 1).chain(face.iter().take(i)) {
                    let edges = &mut adjacency[vertex];
                    if !edges.iter().any(|n| n.vertex == other) {
                        edges.push(Neighbour {
                            vertex: other,
                            face: face_id,
                        });
                    }
                }
            }
        }

        // Circulator order: counter-clockwise by face centroid around the vertex.
        for (vertex, faces_around) in incident.iter_mut().enumerate() {
            let origin = vertices[vertex];
            faces_around.sort_by(|&a, &b| {
                let angle_a = centroid_angle(&vertices, &faces[a], &origin);
                let angle_b = centroid_angle(&vertices, &faces[b], &origin);
                angle_a.total_cmp(&angle_b).then_with(|| a.cmp(&b))
            });
        }

        debug!(
            vertices = vertices.len(),
            faces = faces.len(),
            "built triangle mesh"
        );

        Ok(Self {
            vertices,
            faces,
            incident,
            adjacency,
            hazards: Vec::new(),
        })
    }

    /// Parse a mesh document (`vertices`, `faces`, optional `warnings`).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: MeshDocument = serde_json::from_str(json)?;
        let vertices = document.vertices.into_iter().map(Point3::from).collect();
        let mut mesh = Self::new(vertices, document.faces)?;
        for seed in &document.warnings {
            if let Some(&face) = seed.faces.iter().find(|&&f| f >= mesh.faces.len()) {
                return Err(Error::InvalidMesh {
                    message: format!("warning {} references unknown face {face}", seed.id),
                });
            }
        }
        mesh.hazards = document.warnings;
        Ok(mesh)
    }

    /// Load a mesh document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Vertices sharing an edge with `vertex`.
    pub fn neighbours(&self, vertex: VertexId) -> &[Neighbour] {
        self.adjacency
            .get(vertex)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Hazard annotations shipped with the mesh document.
    pub fn hazards(&self) -> &[WarningSeed] {
        &self.hazards
    }
}

impl Geometry for TriangleMesh {
    fn point(&self, vertex: VertexId) -> Option<Point3> {
        self.vertices.get(vertex).copied()
    }

    fn incident_faces(&self, vertex: VertexId) -> &[FaceId] {
        self.incident
            .get(vertex)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn face_vertices(&self, face: FaceId) -> Option<[VertexId; 3]> {
        self.faces.get(face).copied()
    }
}

fn centroid_angle(vertices: &[Point3], face: &[VertexId; 3], origin: &Point3) -> f64 {
    let cx = face.iter().map(|&v| vertices[v].x).sum::<f64>() / 3.0;
    let cy = face.iter().map(|&v| vertices[v].y).sum::<f64>() / 3.0;
    (cy - origin.y).atan2(cx - origin.x)
}
