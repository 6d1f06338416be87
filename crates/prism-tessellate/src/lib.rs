#![warn(missing_docs)]

//! View-list tessellation for the prism object tree.
//!
//! Curved edges and faces carry cached flat approximations ("view lists")
//! inside the tree. The tree clears their validity flags when geometry
//! changes; this crate regenerates them on demand:
//! 1. Arcs and beziers are subdivided at a fixed step or adaptively to a
//!    chord flatness tolerance
//! 2. Face loops are ordered from their initial point and concatenated
//! 3. Planar faces are filled by ear clipping, ruled faces by a strip
//!    between their two curved sides
//! 4. Fills are gathered into flat triangle meshes for rendering and export

mod edge;
mod face;
mod mesh;

pub use edge::{edge_polyline, edge_view, gen_view_list_arc, gen_view_list_bez};
pub use face::{face_view, gen_view_list_face};
pub use mesh::{tessellate_face, tessellate_tree, tessellate_volume, TriangleMesh};

use prism_tree::TreeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from view-list generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TessellateError {
    /// The tree rejected a lookup or traversal.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The generator does not apply to this edge kind.
    #[error("edge #{ident} is not {expected}")]
    WrongKind {
        /// Identity of the edge.
        ident: u32,
        /// Expected kind.
        expected: &'static str,
    },

    /// Geometry too degenerate to tessellate.
    #[error("cannot tessellate face #{ident}: {message}")]
    Degenerate {
        /// Identity of the face.
        ident: u32,
        /// What went wrong.
        message: String,
    },
}

/// Result alias for tessellation.
pub type Result<T> = std::result::Result<T, TessellateError>;

/// Tessellation parameters controlling view-list density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationParams {
    /// Maximum chord deviation from the true curve, in model units.
    pub flatness: f64,
    /// Upper bound on segments per curved edge.
    pub max_segments: u32,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            flatness: 0.01,
            max_segments: 64,
        }
    }
}

impl TessellationParams {
    /// Create params from a flatness tolerance with the default segment cap.
    pub fn with_flatness(flatness: f64) -> Self {
        Self {
            flatness,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_math::{Point3, Vec3};
    use prism_tree::{ObjId, Tree};

    fn valid_cube(params: &TessellationParams) -> (Tree, prism_tree::VolumeId) {
        let mut tree = Tree::new();
        let base = tree
            .make_rect(Point3::origin(), Vec3::x(), Vec3::y())
            .unwrap();
        let v = tree.extrude_face(base, 1.0).unwrap();
        tessellate_tree(&mut tree, params).unwrap();
        (tree, v)
    }

    #[test]
    fn test_tessellating_validates_every_view() {
        let params = TessellationParams::default();
        let (tree, _) = valid_cube(&params);
        assert!(tree.edges.values().all(|e| e.view.valid));
        assert!(tree.faces.values().all(|f| f.view.valid));
    }

    #[test]
    fn test_vertex_move_regenerates_only_neighbours() {
        let params = TessellationParams::default();
        let (mut tree, v) = valid_cube(&params);
        let p = tree
            .points
            .iter()
            .find(|(_, p)| (p.pos - Point3::new(1.0, 0.0, 1.0)).norm() < 1e-9)
            .map(|(id, _)| id)
            .unwrap();
        let inv = tree.move_obj(p.into(), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!((inv.edges.len(), inv.faces.len()), (3, 3));

        let faces = tree.volume(v).unwrap().faces.clone();
        let untouched: Vec<_> = faces
            .iter()
            .filter(|&&f| tree.view_valid(ObjId::Face(f)))
            .copied()
            .collect();
        assert_eq!(untouched.len(), 3);

        // The stale faces come back with the moved corner in their outline.
        for f in inv.faces {
            let view = face_view(&mut tree, f, &params).unwrap();
            assert!(view.valid);
            assert!(view
                .outline
                .iter()
                .any(|q| (q - Point3::new(2.0, 0.0, 1.0)).norm() < 1e-12));
        }
        assert!(tree.faces.values().all(|f| f.view.valid));
    }

    #[test]
    fn test_with_flatness_keeps_segment_cap() {
        let params = TessellationParams::with_flatness(0.5);
        assert_eq!(params.max_segments, 64);
        assert_eq!(params.flatness, 0.5);
    }
}
