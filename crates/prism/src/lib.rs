#![warn(missing_docs)]

//! prism: a B-rep object-tree modelling kernel.
//!
//! Points, edges, faces and volumes live in one shared graph. Edges share
//! their end points and faces share their edges, so moving a vertex moves
//! every face around it and a saved model writes each shared node once.
//! Display data is cached per edge and face and regenerated lazily after
//! edits.
//!
//! # Example
//!
//! ```rust,no_run
//! use prism::{Config, Model, Point3, Vec3};
//!
//! let mut model = Model::new(Config::default());
//! let base = model.tree_mut().make_rect(Point3::origin(), Vec3::x(), Vec3::y()).unwrap();
//! let cube = model.extrude(base, 1.0).unwrap();
//! let twin = model.copy(cube.into(), Vec3::new(2.0, 0.0, 0.0)).unwrap();
//! model.save("cubes.prism").unwrap();
//! ```

mod config;
mod model;

pub use config::Config;
pub use model::{Model, Stats};

pub use prism_io::SerialError;
pub use prism_math::{Plane, Point3, Tolerance, Vec3};
pub use prism_mesh::{BooleanOp, MeshBoolean, MeshError, MeshExport};
pub use prism_tessellate::{TessellateError, TessellationParams, TriangleMesh};
pub use prism_tree::{
    EdgeId, FaceId, FaceKind, Granularity, LockLevel, ObjId, ObjKind, PointId, Tree, TreeError,
    VolumeId,
};

use thiserror::Error;

/// Errors returned by model operations.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Structural or lock violation in the tree.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// View-list generation failed.
    #[error(transparent)]
    Tessellate(#[from] TessellateError),

    /// Saving or loading failed.
    #[error(transparent)]
    Serial(#[from] SerialError),

    /// Mesh export, import or boolean failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// The configuration file is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration could not be rendered.
    #[error("cannot write configuration: {0}")]
    ConfigFormat(#[from] toml::ser::Error),

    /// An I/O error occurred while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
