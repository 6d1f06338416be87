//! Flat triangle meshes gathered from face view lists.

use prism_math::Vec3;
use prism_tree::{FaceId, ObjId, Tree, VolumeId};

use crate::face::face_view;
use crate::{Result, TessellationParams};

/// A triangle mesh suitable for GPU rendering and file export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32).
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    pub indices: Vec<u32>,
    /// Flat array of vertex normals: `[nx0, ny0, nz0, ...]` (f32). Same length as vertices.
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + offset));
    }

    /// Vertex `i` as an `[x, y, z]` triple.
    pub fn vertex(&self, i: u32) -> [f32; 3] {
        let i = i as usize * 3;
        [self.vertices[i], self.vertices[i + 1], self.vertices[i + 2]]
    }

    /// Total surface area.
    pub fn area(&self) -> f64 {
        self.indices
            .chunks_exact(3)
            .map(|t| {
                let [a, b, c] = [t[0], t[1], t[2]].map(|i| {
                    let v = self.vertex(i);
                    Vec3::new(v[0] as f64, v[1] as f64, v[2] as f64)
                });
                (b - a).cross(&(c - a)).norm() / 2.0
            })
            .sum()
    }
}

/// Mesh of one face, regenerating its view list if stale.
///
/// Vertex normals are the area-weighted average of the adjacent fill
/// triangles.
pub fn tessellate_face(
    tree: &mut Tree,
    face: FaceId,
    params: &TessellationParams,
) -> Result<TriangleMesh> {
    let view = face_view(tree, face, params)?;
    let mut normals = vec![Vec3::zeros(); view.fill_points.len()];
    for t in &view.triangles {
        let [a, b, c] = t.map(|i| view.fill_points[i as usize]);
        let n = (b - a).cross(&(c - a));
        for &i in t {
            normals[i as usize] += n;
        }
    }

    let mut mesh = TriangleMesh::new();
    mesh.vertices = view
        .fill_points
        .iter()
        .flat_map(|p| [p.x as f32, p.y as f32, p.z as f32])
        .collect();
    mesh.normals = normals
        .iter()
        .flat_map(|n| {
            let n = n.try_normalize(1e-300).unwrap_or_else(Vec3::zeros);
            [n.x as f32, n.y as f32, n.z as f32]
        })
        .collect();
    mesh.indices = view.triangles.iter().flatten().copied().collect();
    Ok(mesh)
}

/// Mesh of every face of a volume.
pub fn tessellate_volume(
    tree: &mut Tree,
    volume: VolumeId,
    params: &TessellationParams,
) -> Result<TriangleMesh> {
    let faces = tree.volume(volume)?.faces.clone();
    let mut mesh = TriangleMesh::new();
    for f in faces {
        mesh.merge(&tessellate_face(tree, f, params)?);
    }
    Ok(mesh)
}

/// Mesh of every top-level volume and loose face, refreshing all stale
/// view lists on the way. Top-level points and edges contribute nothing.
pub fn tessellate_tree(tree: &mut Tree, params: &TessellationParams) -> Result<TriangleMesh> {
    let top = tree.top().to_vec();
    let mut mesh = TriangleMesh::new();
    for obj in top {
        match obj {
            ObjId::Volume(v) => mesh.merge(&tessellate_volume(tree, v, params)?),
            ObjId::Face(f) => mesh.merge(&tessellate_face(tree, f, params)?),
            ObjId::Edge(e) => {
                crate::edge::edge_view(tree, e, params)?;
            }
            ObjId::Point(_) => {}
        }
    }
    Ok(mesh)
}
