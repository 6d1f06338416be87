#![warn(missing_docs)]

//! Mesh boundary between the prism object tree and an external boolean
//! engine.
//!
//! Volumes leave the tree as indexed triangle meshes ([`MeshExport`]) and
//! the engine's result comes back as a new volume of triangular faces. The
//! boolean computation itself is behind the [`MeshBoolean`] trait.

mod export;
mod import;

pub use export::export_volume;
pub use import::import_volume;

use prism_tessellate::{TessellateError, TessellationParams};
use prism_tree::{Tree, TreeError, VolumeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// CSG boolean operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOp {
    /// Union: combine both solids.
    Union,
    /// Difference: subtract the tool from the target.
    Difference,
    /// Intersection: keep only the overlapping region.
    Intersection,
}

/// Errors at the mesh boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// A triangle names a vertex past the end of the vertex array.
    #[error("triangle {triangle} uses vertex {index}, mesh has {vertices}")]
    IndexOutOfRange {
        /// Triangle position.
        triangle: usize,
        /// Offending index.
        index: u32,
        /// Vertex count.
        vertices: usize,
    },

    /// The mesh has no triangles.
    #[error("mesh has no triangles")]
    Empty,

    /// Per-triangle tags do not match the triangle count.
    #[error("{tags} tags for {triangles} triangles")]
    TagCount {
        /// Number of tags.
        tags: usize,
        /// Number of triangles.
        triangles: usize,
    },

    /// The boolean engine failed.
    #[error("boolean engine failed: {0}")]
    Engine(String),

    /// The tree rejected an operation.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A face could not be tessellated.
    #[error(transparent)]
    Tessellate(#[from] TessellateError),
}

/// Result alias for the mesh boundary.
pub type Result<T> = std::result::Result<T, MeshError>;

/// An indexed triangle mesh exchanged with a boolean engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshExport {
    /// Vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// Counter-clockwise (outward) triangles as vertex indices.
    pub triangles: Vec<[u32; 3]>,
    /// Per-triangle tag, usually the index of the source face. Empty when
    /// the engine does not carry tags.
    #[serde(default)]
    pub tags: Vec<u32>,
}

impl MeshExport {
    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Check indices and tag count.
    pub fn validate(&self) -> Result<()> {
        if self.triangles.is_empty() {
            return Err(MeshError::Empty);
        }
        if !self.tags.is_empty() && self.tags.len() != self.triangles.len() {
            return Err(MeshError::TagCount {
                tags: self.tags.len(),
                triangles: self.triangles.len(),
            });
        }
        let vertices = self.vertices.len();
        for (triangle, t) in self.triangles.iter().enumerate() {
            if let Some(&index) = t.iter().find(|&&i| i as usize >= vertices) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    index,
                    vertices,
                });
            }
        }
        Ok(())
    }
}

/// An external mesh boolean engine.
pub trait MeshBoolean {
    /// Combine two closed meshes.
    fn apply(&self, op: BooleanOp, a: &MeshExport, b: &MeshExport) -> Result<MeshExport>;
}

/// Run `op` on two volumes through `engine` and import the result as a new
/// top-level volume. The operands stay in the tree.
pub fn boolean_volumes(
    tree: &mut Tree,
    a: VolumeId,
    b: VolumeId,
    op: BooleanOp,
    engine: &dyn MeshBoolean,
    params: &TessellationParams,
) -> Result<VolumeId> {
    let mesh_a = export_volume(tree, a, params)?;
    let mesh_b = export_volume(tree, b, params)?;
    let result = engine.apply(op, &mesh_a, &mesh_b)?;
    let volume = import_volume(tree, &result)?;
    info!(
        ?op,
        triangles = result.num_triangles(),
        "imported boolean result"
    );
    Ok(volume)
}
