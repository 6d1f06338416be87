//! Indexed mesh → volume.

use std::collections::HashMap;

use prism_math::{Plane, Point3};
use prism_tree::{EdgeId, FaceKind, List, ObjId, PointId, Tree, VolumeId};
use tracing::{info, warn};

use crate::{MeshError, MeshExport, Result};

/// Import a mesh as a new top-level volume of triangular `Flat` faces.
///
/// Each mesh vertex becomes one shared point and each undirected mesh edge
/// one shared straight edge, so neighbouring faces keep their topology.
/// Triangles that repeat a vertex or enclose no area are skipped. The mesh
/// is validated before the tree is touched.
pub fn import_volume(tree: &mut Tree, mesh: &MeshExport) -> Result<VolumeId> {
    mesh.validate()?;
    let triangles: Vec<([u32; 3], [Point3; 3], Plane)> = mesh
        .triangles
        .iter()
        .filter(|t| t[0] != t[1] && t[1] != t[2] && t[2] != t[0])
        .filter_map(|&t| {
            let corners = t.map(|i| {
                let [x, y, z] = mesh.vertices[i as usize];
                Point3::new(x, y, z)
            });
            Plane::from_points(&corners).map(|plane| (t, corners, plane))
        })
        .collect();
    if triangles.is_empty() {
        return Err(MeshError::Empty);
    }
    let skipped = mesh.triangles.len() - triangles.len();
    if skipped > 0 {
        warn!(skipped, "dropping degenerate triangles");
    }

    let mut points: HashMap<u32, PointId> = HashMap::new();
    let mut edges: HashMap<(u32, u32), EdgeId> = HashMap::new();
    let volume = tree.add_volume();
    for (t, corners, plane) in &triangles {
        let ids = [0, 1, 2].map(|k| {
            *points
                .entry(t[k])
                .or_insert_with(|| tree.add_point(corners[k]))
        });
        let mut loop_edges = Vec::with_capacity(3);
        for k in 0..3 {
            let (a, b) = (t[k], t[(k + 1) % 3]);
            let key = (a.min(b), a.max(b));
            let edge = match edges.get(&key) {
                Some(&e) => e,
                None => {
                    let e = tree.add_straight_edge(ids[k], ids[(k + 1) % 3])?;
                    edges.insert(key, e);
                    e
                }
            };
            loop_edges.push(edge);
        }
        let face = tree.add_face(FaceKind::Flat, loop_edges, *plane)?;
        tree.faces[face].initial_point = Some(ids[0]);
        tree.link_tail(ObjId::Face(face), List::Volume(volume))?;
    }
    tree.link_tail(ObjId::Volume(volume), List::Top)?;
    info!(
        points = points.len(),
        edges = edges.len(),
        faces = triangles.len(),
        "imported mesh volume"
    );
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export_volume;
    use prism_tessellate::{tessellate_tree, TessellationParams};

    fn tetrahedron() -> MeshExport {
        MeshExport {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            triangles: vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_import_shares_points_and_edges() {
        let mut tree = Tree::new();
        let v = import_volume(&mut tree, &tetrahedron()).unwrap();
        assert_eq!(tree.top(), &[ObjId::Volume(v)]);
        assert_eq!(tree.points.len(), 4);
        assert_eq!(tree.edges.len(), 6);
        assert_eq!(tree.volume(v).unwrap().faces.len(), 4);
        for &f in &tree.volume(v).unwrap().faces {
            let face = tree.face(f).unwrap();
            assert_eq!(face.kind, FaceKind::Flat);
            assert_eq!(face.volume, Some(v));
            assert!(face.plane.has_normal());
        }
    }

    #[test]
    fn test_import_then_export_keeps_orientation() {
        let mut tree = Tree::new();
        let mesh = tetrahedron();
        let v = import_volume(&mut tree, &mesh).unwrap();
        let back = export_volume(&mut tree, v, &TessellationParams::default()).unwrap();
        assert_eq!(back.vertices.len(), 4);
        assert_eq!(back.num_triangles(), 4);
        // Same directed triangles up to rotation of the corners.
        let canonical = |m: &MeshExport| {
            let mut tris: Vec<[[u64; 3]; 3]> = m
                .triangles
                .iter()
                .map(|t| {
                    let c = t.map(|i| m.vertices[i as usize].map(f64::to_bits));
                    let k = (0..3).min_by_key(|&k| c[k]).unwrap_or(0);
                    [c[k], c[(k + 1) % 3], c[(k + 2) % 3]]
                })
                .collect();
            tris.sort();
            tris
        };
        assert_eq!(canonical(&mesh), canonical(&back));
    }

    #[test]
    fn test_degenerate_triangles_skipped() {
        let mut mesh = tetrahedron();
        mesh.triangles.push([1, 1, 2]);
        let mut tree = Tree::new();
        let v = import_volume(&mut tree, &mesh).unwrap();
        assert_eq!(tree.volume(v).unwrap().faces.len(), 4);

        let only_degenerate = MeshExport {
            triangles: vec![[0, 0, 1]],
            ..tetrahedron()
        };
        let mut empty = Tree::new();
        assert_eq!(
            import_volume(&mut empty, &only_degenerate),
            Err(MeshError::Empty)
        );
        assert!(empty.is_empty());
    }

    /// The tetrahedron plus a fifth vertex in line with vertices 0 and 1.
    fn with_collinear_vertex() -> MeshExport {
        let mut mesh = tetrahedron();
        mesh.vertices.push([2.0, 0.0, 0.0]);
        mesh
    }

    #[test]
    fn test_zero_area_triangles_skipped() {
        let mut mesh = with_collinear_vertex();
        mesh.triangles.push([0, 1, 4]);
        let mut tree = Tree::new();
        let v = import_volume(&mut tree, &mesh).unwrap();
        assert_eq!(tree.volume(v).unwrap().faces.len(), 4);
        assert_eq!(tree.points.len(), 4);
        // Every imported face still tessellates.
        let render = tessellate_tree(&mut tree, &TessellationParams::default()).unwrap();
        assert_eq!(render.num_triangles(), 4);

        let only_flat = MeshExport {
            triangles: vec![[0, 1, 4]],
            ..with_collinear_vertex()
        };
        let mut empty = Tree::new();
        assert_eq!(import_volume(&mut empty, &only_flat), Err(MeshError::Empty));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_invalid_mesh_leaves_tree_untouched() {
        let mut mesh = tetrahedron();
        mesh.triangles[2] = [1, 2, 7];
        let mut tree = Tree::new();
        assert!(matches!(
            import_volume(&mut tree, &mesh),
            Err(MeshError::IndexOutOfRange { triangle: 2, index: 7, .. })
        ));
        assert!(tree.is_empty());
        assert!(tree.top().is_empty());
    }
}
