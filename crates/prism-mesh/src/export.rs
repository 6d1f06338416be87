//! Volume → indexed mesh.

use std::collections::HashMap;

use prism_math::Point3;
use prism_tessellate::{face_view, TessellationParams};
use prism_tree::{Tree, VolumeId};
use tracing::debug;

use crate::{MeshExport, Result};

/// Positions closer than this share one exported vertex.
const WELD: f64 = 1e-9;

/// Export a volume as one indexed mesh.
///
/// Stale face views are regenerated first. Fill points that coincide
/// across faces are welded so the result is a closed vertex-shared mesh,
/// and every triangle is tagged with the index of its face in the volume.
pub fn export_volume(
    tree: &mut Tree,
    volume: VolumeId,
    params: &TessellationParams,
) -> Result<MeshExport> {
    let faces = tree.volume(volume)?.faces.clone();
    let mut mesh = MeshExport::default();
    let mut welded: HashMap<[i64; 3], u32> = HashMap::new();

    for (tag, face) in faces.into_iter().enumerate() {
        let view = face_view(tree, face, params)?;
        let remap: Vec<u32> = view
            .fill_points
            .iter()
            .map(|p| weld(&mut mesh, &mut welded, p))
            .collect();
        for t in &view.triangles {
            let tri = t.map(|i| remap[i as usize]);
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                continue;
            }
            mesh.triangles.push(tri);
            mesh.tags.push(tag as u32);
        }
    }
    debug!(
        vertices = mesh.vertices.len(),
        triangles = mesh.triangles.len(),
        "exported volume"
    );
    Ok(mesh)
}

/// Index of the exported vertex for `p`, adding one unless a vertex within
/// `WELD` on every axis already exists. Each grid cell of size `WELD` holds
/// at most one vertex, so the neighbouring cells cover every candidate.
fn weld(mesh: &mut MeshExport, welded: &mut HashMap<[i64; 3], u32>, p: &Point3) -> u32 {
    let coords = [p.x, p.y, p.z];
    let cell = coords.map(|c| (c / WELD).floor() as i64);
    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                let near = [cell[0] + dx, cell[1] + dy, cell[2] + dz];
                let Some(&index) = welded.get(&near) else {
                    continue;
                };
                let v = mesh.vertices[index as usize];
                if (0..3).all(|k| (v[k] - coords[k]).abs() <= WELD) {
                    return index;
                }
            }
        }
    }
    mesh.vertices.push(coords);
    let index = mesh.vertices.len() as u32 - 1;
    welded.insert(cell, index);
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_math::Vec3;
    use std::collections::HashMap;

    #[test]
    fn test_cube_export_is_welded() {
        let mut tree = Tree::new();
        let base = tree
            .make_rect(Point3::origin(), Vec3::x(), Vec3::y())
            .unwrap();
        let v = tree.extrude_face(base, 1.0).unwrap();
        let mesh = export_volume(&mut tree, v, &TessellationParams::default()).unwrap();

        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.num_triangles(), 12);
        for tag in 0..6 {
            assert_eq!(mesh.tags.iter().filter(|&&t| t == tag).count(), 2);
        }
        // Closed: every undirected edge is used by exactly two triangles,
        // once in each direction.
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for t in &mesh.triangles {
            for k in 0..3 {
                *directed.entry((t[k], t[(k + 1) % 3])).or_default() += 1;
            }
        }
        for (&(a, b), &n) in &directed {
            assert_eq!(n, 1);
            assert_eq!(directed.get(&(b, a)), Some(&1));
        }
    }

    #[test]
    fn test_weld_across_cell_boundary() {
        let mut mesh = MeshExport::default();
        let mut welded = HashMap::new();
        let a = weld(&mut mesh, &mut welded, &Point3::new(0.9e-9, 0.0, 1.0));
        let b = weld(&mut mesh, &mut welded, &Point3::new(1.1e-9, 0.0, 1.0));
        let c = weld(&mut mesh, &mut welded, &Point3::new(-1.05e-9, 0.0, 1.0));
        let d = weld(&mut mesh, &mut welded, &Point3::new(0.0, 0.0, 1.0 + 0.5e-9));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, d);
        assert_eq!(mesh.vertices.len(), 2);
    }

    #[test]
    fn test_cylinder_export_shares_rim_vertices() {
        let mut tree = Tree::new();
        let disc = tree.make_circle(Point3::origin(), 1.0, Vec3::z()).unwrap();
        let v = tree.extrude_face(disc, 1.0).unwrap();
        let params = TessellationParams::default();
        let mesh = export_volume(&mut tree, v, &params).unwrap();
        let cap = tree.volume(v).unwrap().faces[0];
        let ring = face_view(&mut tree, cap, &params).unwrap().outline.len();
        // Rim samples of the caps are reused by the side strip.
        assert_eq!(mesh.vertices.len(), 2 * ring);
        let rims = mesh
            .vertices
            .iter()
            .filter(|p| (p[0] * p[0] + p[1] * p[1] - 1.0).abs() < 1e-9)
            .count();
        assert_eq!(rims, mesh.vertices.len());
    }
}
